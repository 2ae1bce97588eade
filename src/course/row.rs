use super::fields::{parse_enrolment_fields, parse_role_fields, EnrolmentFields};
use super::RowError;
use crate::category::{CategoryPath, CategoryReference, ResolutionError};
use std::collections::BTreeMap;

/// A CSV record keyed by lower-cased header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source file, header included.
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize, fields: BTreeMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// Trimmed value of `field`, `None` when absent or blank.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseRow {
    pub line: usize,
    pub shortname: Option<String>,
    pub fullname: Option<String>,
    pub idnumber: Option<String>,
    pub summary: Option<String>,
    pub category: CategoryReference,
    pub delete: bool,
    pub enrolments: BTreeMap<u32, EnrolmentFields>,
    pub role_names: BTreeMap<String, String>,
}

impl CourseRow {
    pub fn parse(raw: &RawRow) -> Result<Self, RowError> {
        let owned = |field: &str| raw.value(field).map(str::to_string);

        let category = CategoryReference {
            id: raw.value("category").map(parse_category_id).transpose()?,
            idnumber: owned("category_idnumber"),
            path: raw
                .value("category_path")
                .map(CategoryPath::parse)
                .transpose()?,
        };

        Ok(Self {
            line: raw.line,
            shortname: owned("shortname"),
            fullname: owned("fullname"),
            idnumber: owned("idnumber"),
            summary: owned("summary"),
            category,
            delete: raw.value("delete").map(parse_flag).transpose()?.unwrap_or(false),
            enrolments: parse_enrolment_fields(raw.entries()),
            role_names: parse_role_fields(raw.entries()),
        })
    }
}

fn parse_category_id(value: &str) -> Result<i64, ResolutionError> {
    match value.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ResolutionError::InvalidInput(format!(
            "category must be a positive integer, got '{}'",
            value
        ))),
    }
}

fn parse_flag(value: &str) -> Result<bool, RowError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(RowError::InvalidValue {
            field: "delete".to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::new(
            2,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_parse_full_row() {
        let row = CourseRow::parse(&raw(&[
            ("shortname", " PHY101 "),
            ("fullname", "Physics 101"),
            ("idnumber", ""),
            ("category_path", "Science / Physics"),
            ("enrolment_1", "manual"),
            ("role_student", "Learner"),
        ]))
        .unwrap();

        assert_eq!(row.line, 2);
        assert_eq!(row.shortname.as_deref(), Some("PHY101"));
        assert_eq!(row.idnumber, None);
        assert_eq!(row.category.path.unwrap().len(), 2);
        assert!(!row.delete);
        assert_eq!(row.enrolments.len(), 1);
        assert_eq!(row.role_names["student"], "Learner");
    }

    #[test]
    fn test_category_id_must_be_positive() {
        for bad in ["0", "-4", "abc"] {
            let err = CourseRow::parse(&raw(&[("category", bad)])).unwrap_err();
            assert!(matches!(err, RowError::Category(ResolutionError::InvalidInput(_))));
        }
        let row = CourseRow::parse(&raw(&[("category", "12")])).unwrap();
        assert_eq!(row.category.id, Some(12));
    }

    #[test]
    fn test_blank_path_segment_rejected() {
        let err = CourseRow::parse(&raw(&[("category_path", "Science /  / Physics")])).unwrap_err();
        assert!(matches!(err, RowError::Category(ResolutionError::InvalidInput(_))));
    }

    #[test]
    fn test_delete_flag() {
        assert!(CourseRow::parse(&raw(&[("delete", "1")])).unwrap().delete);
        assert!(!CourseRow::parse(&raw(&[("delete", "0")])).unwrap().delete);
        assert!(CourseRow::parse(&raw(&[("delete", "maybe")])).is_err());
    }
}
