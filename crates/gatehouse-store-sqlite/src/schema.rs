//! SQL schema for the Gatehouse SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id    INTEGER PRIMARY KEY,
    full_name     TEXT,
    email         TEXT,
    username      TEXT UNIQUE,
    registered_on TEXT NOT NULL
);

-- Groups whose membership is managed here.
CREATE TABLE IF NOT EXISTS groups (
    group_uuid       TEXT PRIMARY KEY,
    group_id         INTEGER NOT NULL UNIQUE,
    name             TEXT NOT NULL UNIQUE,
    description      TEXT,
    owner_group_uuid TEXT NOT NULL,
    visible_to_all   INTEGER NOT NULL DEFAULT 0,
    created_on       TEXT NOT NULL
);

-- Groups known to other backends (LDAP, ...); never edited here.
CREATE TABLE IF NOT EXISTS external_groups (
    group_uuid TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    url        TEXT
);

CREATE TABLE IF NOT EXISTS group_members (
    group_uuid TEXT    NOT NULL REFERENCES groups(group_uuid),
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    PRIMARY KEY (group_uuid, account_id)
);

-- One row per membership period; closed by setting removed_*.
CREATE TABLE IF NOT EXISTS group_members_audit (
    group_uuid TEXT    NOT NULL REFERENCES groups(group_uuid),
    account_id INTEGER NOT NULL,
    added_by   INTEGER NOT NULL,
    added_on   TEXT    NOT NULL,
    removed_by INTEGER,
    removed_on TEXT,
    PRIMARY KEY (group_uuid, account_id, added_on)
);

CREATE TABLE IF NOT EXISTS group_includes (
    group_uuid   TEXT NOT NULL REFERENCES groups(group_uuid),
    include_uuid TEXT NOT NULL,
    PRIMARY KEY (group_uuid, include_uuid)
);

CREATE TABLE IF NOT EXISTS group_includes_audit (
    group_uuid   TEXT    NOT NULL REFERENCES groups(group_uuid),
    include_uuid TEXT    NOT NULL,
    added_by     INTEGER NOT NULL,
    added_on     TEXT    NOT NULL,
    removed_by   INTEGER,
    removed_on   TEXT,
    PRIMARY KEY (group_uuid, include_uuid, added_on)
);

CREATE TABLE IF NOT EXISTS projects (
    name     TEXT PRIMARY KEY,
    parent   TEXT,
    revision TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS access_sections (
    project          TEXT    NOT NULL REFERENCES projects(name),
    position         INTEGER NOT NULL,
    name             TEXT    NOT NULL,
    permissions_json TEXT    NOT NULL,
    PRIMARY KEY (project, name)
);

-- Members of group_uuid own section_name of project.
CREATE TABLE IF NOT EXISTS section_owners (
    project      TEXT NOT NULL REFERENCES projects(name),
    section_name TEXT NOT NULL,
    group_uuid   TEXT NOT NULL,
    PRIMARY KEY (project, section_name, group_uuid)
);

-- Append-only log of stored access revisions.
CREATE TABLE IF NOT EXISTS access_history (
    project      TEXT    NOT NULL REFERENCES projects(name),
    revision     TEXT    NOT NULL,
    message      TEXT,
    account_id   INTEGER NOT NULL,
    committed_on TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS members_audit_group_idx  ON group_members_audit(group_uuid);
CREATE INDEX IF NOT EXISTS includes_audit_group_idx ON group_includes_audit(group_uuid);
CREATE INDEX IF NOT EXISTS members_account_idx      ON group_members(account_id);

PRAGMA user_version = 1;
";
