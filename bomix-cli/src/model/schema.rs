//! Store schema: one series row, BOMs, and their groups
//!
//! Parts and matrix selections are embedded JSON columns; the identity triple
//! carries a uniqueness constraint so re-imports replace instead of duplicate.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    name TEXT,
    note TEXT,
    path TEXT,
    filename TEXT,
    config TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS boms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    description TEXT,
    pcapn TEXT,
    version TEXT NOT NULL,
    phase TEXT NOT NULL,
    date TEXT,
    filename TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project, phase, version)
);

CREATE TABLE IF NOT EXISTS groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bom_id INTEGER NOT NULL REFERENCES boms(id),
    process TEXT,
    item TEXT,
    qty TEXT,
    location TEXT,
    ccl TEXT,
    mfgpn_key TEXT NOT NULL,
    parts TEXT NOT NULL,
    matrix TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_groups_bom ON groups (bom_id);
CREATE INDEX IF NOT EXISTS idx_groups_key ON groups (mfgpn_key);
"#;
