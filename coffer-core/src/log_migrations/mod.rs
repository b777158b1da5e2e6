//! Log database migrations - embedded SQL files

/// All log migrations, embedded at compile time. Same layout as the store
/// migrations: `000_migrations.sql` bootstraps tracking.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
