pub const TABLE_NAME: &str = "game_content";

/// Column order used for every insert. Matches `AssetRecord::values`.
pub const ASSET_FIELDS: [&str; 14] = [
    "asset_name",
    "asset_class",
    "ue_file_path",
    "dependencies",
    "referencers",
    "tag_values",
    "file_size_mb",
    "last_mod_time",
    "disk_file_path",
    "is_asset_loaded",
    "is_redirector",
    "is_u_asset",
    "is_valid",
    "asset_class_path",
];

pub const RESET_SCHEMA: &str = "
    DROP TABLE IF EXISTS game_content;

    CREATE TABLE game_content (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_name TEXT NOT NULL,
        asset_class TEXT NOT NULL,
        ue_file_path TEXT NOT NULL CHECK (ue_file_path <> ''),
        dependencies TEXT NOT NULL,
        referencers TEXT NOT NULL,
        tag_values TEXT NOT NULL,
        file_size_mb TEXT NOT NULL,
        last_mod_time TEXT NOT NULL,
        disk_file_path TEXT NOT NULL,
        is_asset_loaded TEXT NOT NULL CHECK (is_asset_loaded IN ('True', 'False')),
        is_redirector TEXT NOT NULL CHECK (is_redirector IN ('True', 'False')),
        is_u_asset TEXT NOT NULL CHECK (is_u_asset IN ('True', 'False')),
        is_valid TEXT NOT NULL CHECK (is_valid IN ('True', 'False')),
        asset_class_path TEXT NOT NULL,
        UNIQUE(ue_file_path)
    );
";

/// Skips rows whose `ue_file_path` already exists. Only the unique key is
/// ignored; a `CHECK` or `NOT NULL` violation still fails the statement.
pub fn insert_statement() -> String {
    let placeholders = (1..=ASSET_FIELDS.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(ue_file_path) DO NOTHING",
        TABLE_NAME,
        ASSET_FIELDS.join(", "),
        placeholders
    )
}
