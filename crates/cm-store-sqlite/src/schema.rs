//! SQL schema for the company manager SQLite store.
//!
//! Executed once at connection startup. Length limits and referential
//! integrity live here so that violations surface at commit time as
//! constraint failures.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- AUTOINCREMENT: ids of deleted rows are never handed out again.
CREATE TABLE IF NOT EXISTS companies (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE CHECK (length(name) <= 256),
    address     TEXT CHECK (length(address) <= 1024),
    description TEXT CHECK (length(description) <= 2048)
);

-- company_id uses the default restrict behaviour: a company with
-- dependents cannot be deleted.
CREATE TABLE IF NOT EXISTS customers (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER NOT NULL REFERENCES companies(id),
    name       TEXT NOT NULL CHECK (length(name) <= 256),
    email      TEXT NOT NULL CHECK (length(email) <= 1024)
);

CREATE TABLE IF NOT EXISTS employees (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER NOT NULL REFERENCES companies(id),
    first_name TEXT NOT NULL CHECK (length(first_name) <= 256),
    last_name  TEXT NOT NULL CHECK (length(last_name) <= 256),
    email      TEXT NOT NULL CHECK (length(email) <= 1024)
);

CREATE INDEX IF NOT EXISTS customers_company_idx ON customers(company_id);
CREATE INDEX IF NOT EXISTS employees_company_idx ON employees(company_id);

PRAGMA user_version = 1;
";
