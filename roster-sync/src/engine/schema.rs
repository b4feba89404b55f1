//! Schema descriptors: which fields a record type has and how external
//! headers map onto them
//!
//! Header aliasing is a finite table checked when the schema is built. Lookups
//! fold case, underscores, hyphens and runs of whitespace, so `"First Name"`,
//! `"first_name"` and `"FIRST  NAME"` are the same header.

use crate::engine::value::{Record, Value};
use roster_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How raw values for a field are coerced during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
}

/// One column of the spreadsheet export, in output order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    pub key: String,
    pub label: String,
}

/// Immutable description of one record type
#[derive(Debug, Clone)]
pub struct Schema {
    base_name: String,
    keys: Vec<String>,
    key_map: HashMap<String, String>,
    required_keys: Vec<String>,
    primary_key: String,
    date_columns: BTreeSet<String>,
    number_columns: BTreeSet<String>,
    export_columns: Vec<ExportColumn>,
}

impl Schema {
    pub fn builder(base_name: &str, primary_key: &str) -> SchemaBuilder {
        SchemaBuilder::new(base_name, primary_key)
    }

    /// Name of the record collection, also the top-level key of structured files
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn required_keys(&self) -> &[String] {
        &self.required_keys
    }

    pub fn export_columns(&self) -> &[ExportColumn] {
        &self.export_columns
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn field_kind(&self, key: &str) -> FieldKind {
        if self.date_columns.contains(key) {
            FieldKind::Date
        } else if self.number_columns.contains(key) {
            FieldKind::Number
        } else {
            FieldKind::Text
        }
    }

    /// Resolve an external header to its canonical key
    ///
    /// Aliases are consulted first, then the canonical key names themselves.
    /// Unrecognized headers return `None` and are ignored by the normalizer.
    pub fn resolve_header(&self, header: &str) -> Option<&str> {
        self.key_map.get(&fold_header(header)).map(String::as_str)
    }

    /// Identity key of a record, if it carries a primary-key value
    pub fn record_key(&self, record: &Record) -> Option<String> {
        record
            .get(&self.primary_key)
            .map(Value::identity_key)
            .filter(|k| !k.is_empty())
    }

    /// Required keys that are absent (or blank) in `record`
    pub fn missing_required(&self, record: &Record) -> Vec<String> {
        self.required_keys
            .iter()
            .filter(|key| match record.get(key.as_str()) {
                None => true,
                Some(Value::Text(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .cloned()
            .collect()
    }
}

/// Canonical form of a header for alias lookup
pub fn fold_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builder for [`Schema`]; all cross-references are validated in [`SchemaBuilder::build`]
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    base_name: String,
    primary_key: String,
    keys: Vec<String>,
    aliases: Vec<(String, String)>,
    required_keys: Vec<String>,
    date_columns: Vec<String>,
    number_columns: Vec<String>,
    export_columns: Vec<ExportColumn>,
}

impl SchemaBuilder {
    pub fn new(base_name: &str, primary_key: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            primary_key: primary_key.to_string(),
            keys: Vec::new(),
            aliases: Vec::new(),
            required_keys: Vec::new(),
            date_columns: Vec::new(),
            number_columns: Vec::new(),
            export_columns: Vec::new(),
        }
    }

    pub fn key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    pub fn alias(mut self, alias: &str, key: &str) -> Self {
        self.aliases.push((alias.to_string(), key.to_string()));
        self
    }

    pub fn aliases(mut self, key: &str, aliases: &[&str]) -> Self {
        for alias in aliases {
            self.aliases.push((alias.to_string(), key.to_string()));
        }
        self
    }

    pub fn required(mut self, key: &str) -> Self {
        self.required_keys.push(key.to_string());
        self
    }

    pub fn date_column(mut self, key: &str) -> Self {
        self.date_columns.push(key.to_string());
        self
    }

    pub fn number_column(mut self, key: &str) -> Self {
        self.number_columns.push(key.to_string());
        self
    }

    pub fn export_column(mut self, key: &str, label: &str) -> Self {
        self.export_columns.push(ExportColumn {
            key: key.to_string(),
            label: label.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<Schema> {
        let name = self.base_name.clone();
        let invalid = |msg: String| Error::Config(format!("schema '{}': {}", name, msg));

        if self.base_name.trim().is_empty() {
            return Err(Error::Config("schema base name is empty".to_string()));
        }

        let mut seen = BTreeSet::new();
        for key in &self.keys {
            if key.trim().is_empty() {
                return Err(invalid("empty key".to_string()));
            }
            if !seen.insert(key.as_str()) {
                return Err(invalid(format!("key '{}' declared twice", key)));
            }
        }

        let check_known = |role: &str, key: &str| -> Result<()> {
            if seen.contains(key) {
                Ok(())
            } else {
                Err(invalid(format!("{} '{}' is not a declared key", role, key)))
            }
        };

        check_known("primary key", &self.primary_key)?;
        for key in &self.required_keys {
            check_known("required key", key)?;
        }
        for key in &self.date_columns {
            check_known("date column", key)?;
        }
        for key in &self.number_columns {
            check_known("number column", key)?;
            if self.date_columns.contains(key) {
                return Err(invalid(format!("'{}' is both a date and a number column", key)));
            }
        }
        for column in &self.export_columns {
            check_known("export column", &column.key)?;
        }

        // Canonical names resolve to themselves, aliases layered on top
        let mut key_map: HashMap<String, String> = HashMap::new();
        let mut insert = |header: &str, key: &str| -> Result<()> {
            let folded = fold_header(header);
            if folded.is_empty() {
                return Err(invalid(format!("empty alias for '{}'", key)));
            }
            match key_map.get(&folded) {
                Some(existing) if existing != key => Err(invalid(format!(
                    "header '{}' maps to both '{}' and '{}'",
                    header, existing, key
                ))),
                _ => {
                    key_map.insert(folded, key.to_string());
                    Ok(())
                }
            }
        };

        for key in &self.keys {
            insert(key, key)?;
        }
        for (alias, key) in &self.aliases {
            check_known("alias target", key)?;
            insert(alias, key)?;
        }

        let export_columns = if self.export_columns.is_empty() {
            self.keys
                .iter()
                .map(|k| ExportColumn {
                    key: k.clone(),
                    label: k.clone(),
                })
                .collect()
        } else {
            self.export_columns
        };

        // Exported files must import back onto the same fields
        for column in &export_columns {
            match key_map.get(&fold_header(&column.label)) {
                Some(key) if *key == column.key => {}
                _ => {
                    return Err(invalid(format!(
                        "export label '{}' does not resolve to '{}'",
                        column.label, column.key
                    )))
                }
            }
        }
        if !export_columns.iter().any(|c| c.key == self.primary_key) {
            return Err(invalid("export columns omit the primary key".to_string()));
        }

        let mut required_keys = vec![self.primary_key.clone()];
        for key in self.required_keys {
            if !required_keys.contains(&key) {
                required_keys.push(key);
            }
        }

        Ok(Schema {
            base_name: self.base_name,
            keys: self.keys,
            key_map,
            required_keys,
            primary_key: self.primary_key,
            date_columns: self.date_columns.into_iter().collect(),
            number_columns: self.number_columns.into_iter().collect(),
            export_columns,
        })
    }
}

/// Applicants: people who applied for a position, identified by UTORid
pub fn applicants() -> Result<Schema> {
    Schema::builder("applicants", "utorid")
        .key("utorid")
        .key("student_number")
        .key("first_name")
        .key("last_name")
        .key("email")
        .key("phone")
        .aliases("utorid", &["UTORid", "UTOR ID", "User ID"])
        .aliases(
            "student_number",
            &["Student Number", "Student No", "Student ID", "Student #"],
        )
        .aliases("first_name", &["First Name", "First", "Given Name", "Given", "Firstname"])
        .aliases("last_name", &["Last Name", "Last", "Surname", "Family Name", "Lastname"])
        .aliases("email", &["Email", "Email Address", "E-mail", "Mail"])
        .aliases("phone", &["Phone", "Phone Number", "Telephone", "Tel"])
        .required("utorid")
        .export_column("last_name", "Last Name")
        .export_column("first_name", "First Name")
        .export_column("utorid", "UTORid")
        .export_column("student_number", "Student Number")
        .export_column("email", "email")
        .export_column("phone", "Phone")
        .build()
}

/// Positions: teaching positions offered in a session, identified by position code
pub fn positions() -> Result<Schema> {
    Schema::builder("positions", "position_code")
        .key("position_code")
        .key("position_title")
        .key("hours_per_assignment")
        .key("start_date")
        .key("end_date")
        .key("desired_num_assignments")
        .key("contract_template")
        .aliases("position_code", &["Position Code", "Course Code", "Code", "Position"])
        .aliases("position_title", &["Position Title", "Title", "Course Title"])
        .aliases(
            "hours_per_assignment",
            &["Hours Per Assignment", "Hours", "Hours/Assignment"],
        )
        .aliases("start_date", &["Start Date", "Start"])
        .aliases("end_date", &["End Date", "End"])
        .aliases(
            "desired_num_assignments",
            &["Desired Num Assignments", "Desired Assignments", "Number of Assignments"],
        )
        .aliases("contract_template", &["Contract Template", "Template"])
        .required("position_code")
        .number_column("hours_per_assignment")
        .number_column("desired_num_assignments")
        .date_column("start_date")
        .date_column("end_date")
        .export_column("position_code", "Position Code")
        .export_column("position_title", "Position Title")
        .export_column("hours_per_assignment", "Hours Per Assignment")
        .export_column("start_date", "Start Date")
        .export_column("end_date", "End Date")
        .export_column("desired_num_assignments", "Desired Num Assignments")
        .export_column("contract_template", "Contract Template")
        .build()
}

/// Registered schemas, looked up by base name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in applicant and position schemas
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(applicants()?)?;
        registry.register(positions()?)?;
        Ok(registry)
    }

    pub fn register(&mut self, schema: Schema) -> Result<()> {
        let name = schema.base_name().to_string();
        if self.schemas.contains_key(&name) {
            return Err(Error::Config(format!("schema '{}' registered twice", name)));
        }
        self.schemas.insert(name, schema);
        Ok(())
    }

    pub fn get(&self, base_name: &str) -> Option<&Schema> {
        self.schemas.get(base_name)
    }

    /// Like [`SchemaRegistry::get`] but reports the known names on failure
    pub fn require(&self, base_name: &str) -> Result<&Schema> {
        self.get(base_name).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown schema '{}' (known: {})",
                base_name,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }
}
