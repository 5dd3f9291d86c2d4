pub const SCHEMA_VERSION: &str = "1";

pub const CREATE_SCHEMA_SQL: &str = r#"
BEGIN TRANSACTION;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');

-- Content records. format holds the lowercase post format tag
-- ('image', 'link', 'video', 'audio', 'quote') or NULL / 'none'.
CREATE TABLE IF NOT EXISTS records (
    record_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    format TEXT DEFAULT NULL
);

-- Matches the normalized tag comparison made when selecting records
CREATE INDEX IF NOT EXISTS idx_records_format ON records (lower(trim(format)), record_id);

-- Side-car key/value store, at most one value per key per record
CREATE TABLE IF NOT EXISTS record_meta (
    record_id INTEGER NOT NULL,
    meta_key TEXT NOT NULL,
    meta_value TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (record_id, meta_key),
    FOREIGN KEY (record_id) REFERENCES records(record_id)
);

-- Serves the EXISTS / NOT EXISTS probes made while selecting records
CREATE INDEX IF NOT EXISTS idx_record_meta_key ON record_meta (meta_key, record_id);

-- Media attachments referenced by numeric id from legacy image side-car values
CREATE TABLE IF NOT EXISTS attachments (
    attachment_id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    alt TEXT NOT NULL DEFAULT ''
);

-- Intermediate sizes generated for an attachment ('thumbnail', 'medium', 'large', ...)
CREATE TABLE IF NOT EXISTS attachment_sizes (
    attachment_id INTEGER NOT NULL,
    size_name TEXT NOT NULL,
    url TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    PRIMARY KEY (attachment_id, size_name),
    FOREIGN KEY (attachment_id) REFERENCES attachments(attachment_id)
);

COMMIT;
"#;
