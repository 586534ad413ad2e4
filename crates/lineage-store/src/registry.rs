//! Static schema registry: versioned DDL and migration scripts.
//!
//! The registry is a compile-time bundle in SQLite dialect, keyed by
//! integer schema version:
//!
//! - [`ddl`] creates the full schema of a version from an empty database
//! - [`upgrade_queries`]`(v)` migrates a database from `v - 1` to `v`
//! - [`downgrade_queries`]`(v)` migrates a database from `v` to `v - 1`
//! - [`upgrade_verification`] / [`downgrade_verification`] carry setup and
//!   check queries for migration tests
//!
//! ## Version history
//!
//! - **v0**: historical shape. `Type` carries an `is_artifact_type` flag;
//!   there is no environment table, no contexts, no attribution or
//!   association. A database whose recognizable tables exist without
//!   `MLMDEnv` is treated as v0.
//! - **v1**: adds `MLMDEnv(schema_version)`; rebuilds `Type` with an
//!   integer `type_kind` column and a unique `(name, type_kind)` index.
//! - **v2**: adds the opaque `input_type` / `output_type` signature
//!   columns to `Type`.
//! - **v3**: adds `Context` and `ContextProperty` with the unique
//!   `(type_id, name)` index.
//! - **v4**: adds `Attribution` and `Association` with unique pair
//!   indexes. This is the library version.

/// Highest schema version this library materializes.
pub const LIBRARY_SCHEMA_VERSION: i64 = 4;

/// Oldest schema version the migration engine can upgrade from.
pub const EARLIEST_SCHEMA_VERSION: i64 = 0;

/// How far ahead of the library a stored schema may be while remaining
/// readable. A store exactly one version ahead only adds tables and
/// columns this library ignores; anything further is rejected at connect
/// time.
pub const COMPATIBLE_VERSION_WINDOW: i64 = 1;

/// Name of the single-row environment table holding the schema version.
pub const ENV_TABLE: &str = "MLMDEnv";

/// Tables that must all exist in a library-version store. A store that
/// reports the library version but is missing one of these is corrupt.
pub const HEAD_TABLES: &[&str] = &[
    "Type",
    "TypeProperty",
    "Artifact",
    "ArtifactProperty",
    "Execution",
    "ExecutionProperty",
    "Context",
    "ContextProperty",
    "Event",
    "EventPath",
    "Attribution",
    "Association",
    ENV_TABLE,
];

/// Probe for the existence of a table; binds the table name, returns a
/// single boolean cell.
pub const TABLE_EXISTS_QUERY: &str =
    "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1;";

/// Setup and verification queries for one migration direction of one
/// version.
///
/// `previous_version_setup_queries` materialize the pre-migration state;
/// `post_migration_verification_queries` each return exactly one row with
/// one boolean-coercible column that must be true after the migration.
#[derive(Debug)]
pub struct VerificationScheme {
    /// Queries that populate the pre-migration state.
    pub previous_version_setup_queries: &'static [&'static str],
    /// Single-cell boolean checks run after the migration.
    pub post_migration_verification_queries: &'static [&'static str],
}

// -- v0 (historical) --------------------------------------------------------

const TYPE_V0: &str = "CREATE TABLE IF NOT EXISTS `Type` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `name` VARCHAR(255) NOT NULL, \
     `is_artifact_type` TINYINT NOT NULL );";

const TYPE_PROPERTY: &str = "CREATE TABLE IF NOT EXISTS `TypeProperty` ( \
     `type_id` INT NOT NULL, \
     `name` VARCHAR(255) NOT NULL, \
     `data_type` INT NOT NULL, \
     PRIMARY KEY (`type_id`, `name`) );";

const ARTIFACT: &str = "CREATE TABLE IF NOT EXISTS `Artifact` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `type_id` INT NOT NULL, \
     `uri` TEXT );";

const ARTIFACT_PROPERTY: &str = "CREATE TABLE IF NOT EXISTS `ArtifactProperty` ( \
     `artifact_id` INT NOT NULL, \
     `name` VARCHAR(255) NOT NULL, \
     `is_custom_property` TINYINT NOT NULL, \
     `int_value` INT, \
     `double_value` DOUBLE, \
     `string_value` TEXT, \
     PRIMARY KEY (`artifact_id`, `name`, `is_custom_property`) );";

const EXECUTION: &str = "CREATE TABLE IF NOT EXISTS `Execution` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `type_id` INT NOT NULL );";

const EXECUTION_PROPERTY: &str = "CREATE TABLE IF NOT EXISTS `ExecutionProperty` ( \
     `execution_id` INT NOT NULL, \
     `name` VARCHAR(255) NOT NULL, \
     `is_custom_property` TINYINT NOT NULL, \
     `int_value` INT, \
     `double_value` DOUBLE, \
     `string_value` TEXT, \
     PRIMARY KEY (`execution_id`, `name`, `is_custom_property`) );";

const EVENT: &str = "CREATE TABLE IF NOT EXISTS `Event` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `artifact_id` INT NOT NULL, \
     `execution_id` INT NOT NULL, \
     `type` INT NOT NULL, \
     `milliseconds_since_epoch` INT );";

const EVENT_PATH: &str = "CREATE TABLE IF NOT EXISTS `EventPath` ( \
     `event_id` INT NOT NULL, \
     `step_position` INT NOT NULL, \
     `is_index_step` TINYINT NOT NULL, \
     `step_value` TEXT NOT NULL );";

// -- v1 and later -----------------------------------------------------------

const TYPE_V1: &str = "CREATE TABLE IF NOT EXISTS `Type` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `name` VARCHAR(255) NOT NULL, \
     `type_kind` TINYINT NOT NULL );";

const TYPE_V2: &str = "CREATE TABLE IF NOT EXISTS `Type` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `name` VARCHAR(255) NOT NULL, \
     `type_kind` TINYINT NOT NULL, \
     `input_type` TEXT, \
     `output_type` TEXT );";

const TYPE_NAME_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS `idx_type_name_kind` \
     ON `Type` (`name`, `type_kind`);";

const ENV: &str = "CREATE TABLE IF NOT EXISTS `MLMDEnv` ( `schema_version` INT NOT NULL );";

const CONTEXT: &str = "CREATE TABLE IF NOT EXISTS `Context` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `type_id` INT NOT NULL, \
     `name` VARCHAR(255) NOT NULL );";

const CONTEXT_NAME_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS `idx_context_type_id_name` \
     ON `Context` (`type_id`, `name`);";

const CONTEXT_PROPERTY: &str = "CREATE TABLE IF NOT EXISTS `ContextProperty` ( \
     `context_id` INT NOT NULL, \
     `name` VARCHAR(255) NOT NULL, \
     `is_custom_property` TINYINT NOT NULL, \
     `int_value` INT, \
     `double_value` DOUBLE, \
     `string_value` TEXT, \
     PRIMARY KEY (`context_id`, `name`, `is_custom_property`) );";

const ATTRIBUTION: &str = "CREATE TABLE IF NOT EXISTS `Attribution` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `context_id` INT NOT NULL, \
     `artifact_id` INT NOT NULL );";

const ATTRIBUTION_PAIR_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS `idx_attribution_context_artifact` \
     ON `Attribution` (`context_id`, `artifact_id`);";

const ASSOCIATION: &str = "CREATE TABLE IF NOT EXISTS `Association` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `context_id` INT NOT NULL, \
     `execution_id` INT NOT NULL );";

const ASSOCIATION_PAIR_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS `idx_association_context_execution` \
     ON `Association` (`context_id`, `execution_id`);";

const DDL_V0: &[&str] = &[
    TYPE_V0,
    TYPE_PROPERTY,
    ARTIFACT,
    ARTIFACT_PROPERTY,
    EXECUTION,
    EXECUTION_PROPERTY,
    EVENT,
    EVENT_PATH,
];

const DDL_V1: &[&str] = &[
    TYPE_V1,
    TYPE_NAME_INDEX,
    TYPE_PROPERTY,
    ARTIFACT,
    ARTIFACT_PROPERTY,
    EXECUTION,
    EXECUTION_PROPERTY,
    EVENT,
    EVENT_PATH,
    ENV,
];

const DDL_V2: &[&str] = &[
    TYPE_V2,
    TYPE_NAME_INDEX,
    TYPE_PROPERTY,
    ARTIFACT,
    ARTIFACT_PROPERTY,
    EXECUTION,
    EXECUTION_PROPERTY,
    EVENT,
    EVENT_PATH,
    ENV,
];

const DDL_V3: &[&str] = &[
    TYPE_V2,
    TYPE_NAME_INDEX,
    TYPE_PROPERTY,
    ARTIFACT,
    ARTIFACT_PROPERTY,
    EXECUTION,
    EXECUTION_PROPERTY,
    CONTEXT,
    CONTEXT_NAME_INDEX,
    CONTEXT_PROPERTY,
    EVENT,
    EVENT_PATH,
    ENV,
];

const DDL_V4: &[&str] = &[
    TYPE_V2,
    TYPE_NAME_INDEX,
    TYPE_PROPERTY,
    ARTIFACT,
    ARTIFACT_PROPERTY,
    EXECUTION,
    EXECUTION_PROPERTY,
    CONTEXT,
    CONTEXT_NAME_INDEX,
    CONTEXT_PROPERTY,
    EVENT,
    EVENT_PATH,
    ATTRIBUTION,
    ATTRIBUTION_PAIR_INDEX,
    ASSOCIATION,
    ASSOCIATION_PAIR_INDEX,
    ENV,
];

// -- migrations -------------------------------------------------------------

// SQLite cannot drop or retype columns in place, so the `Type` rebuilds go
// through a temporary table and a rename.
const UPGRADE_V1: &[&str] = &[
    ENV,
    "CREATE TABLE `TypeTemp` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `name` VARCHAR(255) NOT NULL, \
     `type_kind` TINYINT NOT NULL );",
    "INSERT INTO `TypeTemp` (`id`, `name`, `type_kind`) \
     SELECT `id`, `name`, CASE WHEN `is_artifact_type` THEN 1 ELSE 0 END FROM `Type`;",
    "DROP TABLE `Type`;",
    "ALTER TABLE `TypeTemp` RENAME TO `Type`;",
    TYPE_NAME_INDEX,
];

const UPGRADE_V2: &[&str] = &[
    "ALTER TABLE `Type` ADD COLUMN `input_type` TEXT;",
    "ALTER TABLE `Type` ADD COLUMN `output_type` TEXT;",
];

const UPGRADE_V3: &[&str] = &[CONTEXT, CONTEXT_NAME_INDEX, CONTEXT_PROPERTY];

const UPGRADE_V4: &[&str] = &[
    ATTRIBUTION,
    ATTRIBUTION_PAIR_INDEX,
    ASSOCIATION,
    ASSOCIATION_PAIR_INDEX,
];

const DOWNGRADE_V1: &[&str] = &[
    "CREATE TABLE `TypeTemp` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `name` VARCHAR(255) NOT NULL, \
     `is_artifact_type` TINYINT NOT NULL );",
    "INSERT INTO `TypeTemp` (`id`, `name`, `is_artifact_type`) \
     SELECT `id`, `name`, CASE WHEN `type_kind` = 1 THEN 1 ELSE 0 END FROM `Type`;",
    "DROP TABLE `Type`;",
    "ALTER TABLE `TypeTemp` RENAME TO `Type`;",
    "DROP TABLE `MLMDEnv`;",
];

const DOWNGRADE_V2: &[&str] = &[
    "CREATE TABLE `TypeTemp` ( \
     `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
     `name` VARCHAR(255) NOT NULL, \
     `type_kind` TINYINT NOT NULL );",
    "INSERT INTO `TypeTemp` (`id`, `name`, `type_kind`) \
     SELECT `id`, `name`, `type_kind` FROM `Type`;",
    "DROP TABLE `Type`;",
    "ALTER TABLE `TypeTemp` RENAME TO `Type`;",
    TYPE_NAME_INDEX,
];

const DOWNGRADE_V3: &[&str] = &[
    "DROP TABLE IF EXISTS `ContextProperty`;",
    "DROP TABLE IF EXISTS `Context`;",
];

const DOWNGRADE_V4: &[&str] = &[
    "DROP TABLE IF EXISTS `Attribution`;",
    "DROP TABLE IF EXISTS `Association`;",
];

// -- verification schemes ---------------------------------------------------

// Upgrade setups run in version order against an initially empty store, so
// the first scheme creates the v0 shape and later setups insert through it.
// Post-migration checks run once the store has reached the library version
// and must stay true under later additive migrations.
const UPGRADE_VERIFY_V1: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[
        TYPE_V0,
        TYPE_PROPERTY,
        ARTIFACT,
        ARTIFACT_PROPERTY,
        EXECUTION,
        EXECUTION_PROPERTY,
        EVENT,
        EVENT_PATH,
        "INSERT INTO `Type` (`name`, `is_artifact_type`) VALUES ('saved_model', 1);",
        "INSERT INTO `Type` (`name`, `is_artifact_type`) VALUES ('trainer', 0);",
        "INSERT INTO `TypeProperty` (`type_id`, `name`, `data_type`) VALUES (1, 'version', 1);",
        "INSERT INTO `Artifact` (`type_id`, `uri`) VALUES (1, 'path/to/model');",
        "INSERT INTO `ArtifactProperty` \
         (`artifact_id`, `name`, `is_custom_property`, `int_value`) VALUES (1, 'version', 0, 7);",
        "INSERT INTO `Execution` (`type_id`) VALUES (2);",
        "INSERT INTO `Event` (`artifact_id`, `execution_id`, `type`, `milliseconds_since_epoch`) \
         VALUES (1, 1, 4, 12345);",
        "INSERT INTO `EventPath` (`event_id`, `step_position`, `is_index_step`, `step_value`) \
         VALUES (1, 0, 1, '1');",
    ],
    post_migration_verification_queries: &[
        "SELECT count(*) = 1 FROM `Type` WHERE `name` = 'saved_model' AND `type_kind` = 1;",
        "SELECT count(*) = 1 FROM `Type` WHERE `name` = 'trainer' AND `type_kind` = 0;",
        "SELECT count(*) = 0 FROM pragma_table_info('Type') WHERE `name` = 'is_artifact_type';",
        "SELECT count(*) = 1 FROM `Artifact` WHERE `uri` = 'path/to/model';",
        "SELECT count(*) = 1 FROM `ArtifactProperty` WHERE `name` = 'version' AND `int_value` = 7;",
        "SELECT count(*) = 1 FROM `Event` WHERE `milliseconds_since_epoch` = 12345;",
    ],
};

const UPGRADE_VERIFY_V2: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[
        "INSERT INTO `Type` (`name`, `is_artifact_type`) VALUES ('evaluator', 0);",
    ],
    post_migration_verification_queries: &[
        "SELECT count(*) = 1 FROM pragma_table_info('Type') WHERE `name` = 'input_type';",
        "SELECT count(*) = 1 FROM pragma_table_info('Type') WHERE `name` = 'output_type';",
        "SELECT count(*) = 1 FROM `Type` WHERE `name` = 'evaluator' \
         AND `input_type` IS NULL AND `output_type` IS NULL;",
    ],
};

const UPGRADE_VERIFY_V3: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[],
    post_migration_verification_queries: &[
        "SELECT count(*) = 1 FROM sqlite_master WHERE type = 'table' AND name = 'Context';",
        "SELECT count(*) = 1 FROM sqlite_master WHERE type = 'table' AND name = 'ContextProperty';",
        "SELECT count(*) = 0 FROM `Context`;",
    ],
};

const UPGRADE_VERIFY_V4: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[],
    post_migration_verification_queries: &[
        "SELECT count(*) = 1 FROM sqlite_master WHERE type = 'table' AND name = 'Attribution';",
        "SELECT count(*) = 1 FROM sqlite_master WHERE type = 'table' AND name = 'Association';",
        "SELECT count(*) = 2 FROM sqlite_master WHERE type = 'index' AND name IN \
         ('idx_attribution_context_artifact', 'idx_association_context_execution');",
    ],
};

// Downgrade schemes are keyed by the target version: the setup populates
// the `target + 1` state and the checks run once the store is back at the
// target.
const DOWNGRADE_VERIFY_V0: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[
        "INSERT INTO `Type` (`name`, `type_kind`) VALUES ('plain_model', 1);",
    ],
    post_migration_verification_queries: &[
        "SELECT count(*) = 0 FROM sqlite_master WHERE type = 'table' AND name = 'MLMDEnv';",
        "SELECT count(*) = 1 FROM pragma_table_info('Type') WHERE `name` = 'is_artifact_type';",
        "SELECT count(*) = 1 FROM `Type` WHERE `name` = 'plain_model' AND `is_artifact_type` = 1;",
    ],
};

const DOWNGRADE_VERIFY_V1: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[
        "INSERT INTO `Type` (`name`, `type_kind`, `input_type`, `output_type`) \
         VALUES ('signed_trainer', 0, '{\"any\":{}}', '{\"none\":{}}');",
    ],
    post_migration_verification_queries: &[
        "SELECT count(*) = 0 FROM pragma_table_info('Type') WHERE `name` = 'input_type';",
        "SELECT count(*) = 1 FROM `Type` WHERE `name` = 'signed_trainer' AND `type_kind` = 0;",
    ],
};

const DOWNGRADE_VERIFY_V2: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[
        "INSERT INTO `Context` (`type_id`, `name`) VALUES (1, 'run_one');",
    ],
    post_migration_verification_queries: &[
        "SELECT count(*) = 0 FROM sqlite_master WHERE type = 'table' \
         AND name IN ('Context', 'ContextProperty');",
    ],
};

const DOWNGRADE_VERIFY_V3: VerificationScheme = VerificationScheme {
    previous_version_setup_queries: &[
        "INSERT INTO `Attribution` (`context_id`, `artifact_id`) VALUES (1, 1);",
        "INSERT INTO `Association` (`context_id`, `execution_id`) VALUES (1, 1);",
    ],
    post_migration_verification_queries: &[
        "SELECT count(*) = 0 FROM sqlite_master WHERE type = 'table' \
         AND name IN ('Attribution', 'Association');",
    ],
};

// -- lookups ----------------------------------------------------------------

/// Queries creating the full schema of `version` from an empty database.
#[must_use]
pub fn ddl(version: i64) -> Option<&'static [&'static str]> {
    match version {
        0 => Some(DDL_V0),
        1 => Some(DDL_V1),
        2 => Some(DDL_V2),
        3 => Some(DDL_V3),
        4 => Some(DDL_V4),
        _ => None,
    }
}

/// Queries migrating a database from `version - 1` to `version`.
#[must_use]
pub fn upgrade_queries(version: i64) -> Option<&'static [&'static str]> {
    match version {
        1 => Some(UPGRADE_V1),
        2 => Some(UPGRADE_V2),
        3 => Some(UPGRADE_V3),
        4 => Some(UPGRADE_V4),
        _ => None,
    }
}

/// Queries migrating a database from `version` to `version - 1`.
#[must_use]
pub fn downgrade_queries(version: i64) -> Option<&'static [&'static str]> {
    match version {
        1 => Some(DOWNGRADE_V1),
        2 => Some(DOWNGRADE_V2),
        3 => Some(DOWNGRADE_V3),
        4 => Some(DOWNGRADE_V4),
        _ => None,
    }
}

/// Verification scheme for the upgrade arriving at `version`.
#[must_use]
pub fn upgrade_verification(version: i64) -> Option<&'static VerificationScheme> {
    match version {
        1 => Some(&UPGRADE_VERIFY_V1),
        2 => Some(&UPGRADE_VERIFY_V2),
        3 => Some(&UPGRADE_VERIFY_V3),
        4 => Some(&UPGRADE_VERIFY_V4),
        _ => None,
    }
}

/// Verification scheme for the downgrade arriving at `target_version`.
#[must_use]
pub fn downgrade_verification(target_version: i64) -> Option<&'static VerificationScheme> {
    match target_version {
        0 => Some(&DOWNGRADE_VERIFY_V0),
        1 => Some(&DOWNGRADE_VERIFY_V1),
        2 => Some(&DOWNGRADE_VERIFY_V2),
        3 => Some(&DOWNGRADE_VERIFY_V3),
        _ => None,
    }
}
