/// Constants used by the self-check report.
pub mod report {
    /// Kind label reported in `class_name` for configured-asset connectors.
    pub const CONNECTOR_KIND: &str = "ConfiguredAssetDataConnector";
    /// Default number of example asset names and references in a report.
    pub const DEFAULT_MAX_EXAMPLES: usize = 3;
}

/// Constants used by reference listing.
pub mod listing {
    /// Path delimiter used to decide whether a key is nested below a prefix.
    pub const DEFAULT_DELIMITER: &str = "/";
}

/// Names accepted by the sorter registry.
///
/// Each kind has a short name and the class-style name used by older
/// configuration files.
pub mod sorters {
    /// Short name for the lexicographic sorter.
    pub const LEXICOGRAPHIC: &str = "lexicographic";
    /// Class-style name for the lexicographic sorter.
    pub const LEXICOGRAPHIC_CLASS: &str = "LexicographicSorter";
    /// Short name for the numeric sorter.
    pub const NUMERIC: &str = "numeric";
    /// Class-style name for the numeric sorter.
    pub const NUMERIC_CLASS: &str = "NumericSorter";
    /// Short name for the datetime sorter.
    pub const DATETIME: &str = "datetime";
    /// Class-style name for the datetime sorter.
    pub const DATETIME_CLASS: &str = "DateTimeSorter";
    /// Short name for the custom-list sorter.
    pub const CUSTOM_LIST: &str = "custom_list";
    /// Class-style name for the custom-list sorter.
    pub const CUSTOM_LIST_CLASS: &str = "CustomListSorter";
    /// Format used by datetime sorters that declare none.
    pub const DEFAULT_DATETIME_FORMAT: &str = "%Y%m%d";
    /// Ascending direction token.
    pub const ORDER_ASC: &str = "asc";
    /// Descending direction token.
    pub const ORDER_DESC: &str = "desc";
}
