//! Typed views over the loosely structured `enrolment_*` and `role_*`
//! column families.

use crate::storage::models::Role;
use std::collections::BTreeMap;

const ENROLMENT_PREFIX: &str = "enrolment_";
const ROLE_PREFIX: &str = "role_";

/// Columns sharing one `enrolment_<n>` index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrolmentFields {
    pub method: Option<String>,
    pub options: BTreeMap<String, String>,
}

/// Enrolment methods to configure on a course, keyed by method name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrolmentData {
    pub methods: BTreeMap<String, BTreeMap<String, String>>,
    /// Method names that are not available and were dropped.
    pub unknown: Vec<String>,
}

/// Role name overrides keyed by role id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleNames {
    pub names: BTreeMap<i64, String>,
    /// Role shortnames that do not exist.
    pub invalid: Vec<String>,
}

/// Group `enrolment_<n>` and `enrolment_<n>_<option>` columns by `<n>`.
pub fn parse_enrolment_fields<'a, I>(fields: I) -> BTreeMap<u32, EnrolmentFields>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut grouped: BTreeMap<u32, EnrolmentFields> = BTreeMap::new();

    for (field, value) in fields {
        let Some(rest) = field.strip_prefix(ENROLMENT_PREFIX) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let (index, option) = match rest.split_once('_') {
            Some((index, option)) => (index, Some(option)),
            None => (rest, None),
        };
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(index) = index.parse::<u32>() else {
            continue;
        };

        match option {
            None => grouped.entry(index).or_default().method = Some(value.to_string()),
            Some("") => continue,
            Some(option) => {
                grouped
                    .entry(index)
                    .or_default()
                    .options
                    .insert(option.to_string(), value.to_string());
            }
        }
    }

    grouped
}

/// Keep the methods whose name is in `available`. Options given without a
/// method are ignored.
pub fn enrolment_data(grouped: BTreeMap<u32, EnrolmentFields>, available: &[String]) -> EnrolmentData {
    let mut data = EnrolmentData::default();

    for fields in grouped.into_values() {
        let Some(method) = fields.method else {
            continue;
        };
        if available.iter().any(|m| m == &method) {
            data.methods.insert(method, fields.options);
        } else {
            data.unknown.push(method);
        }
    }

    data
}

/// Collect `role_<shortname>` columns.
pub fn parse_role_fields<'a, I>(fields: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    fields
        .into_iter()
        .filter_map(|(field, value)| {
            field
                .strip_prefix(ROLE_PREFIX)
                .filter(|shortname| !shortname.is_empty() && !value.is_empty())
                .map(|shortname| (shortname.to_string(), value.to_string()))
        })
        .collect()
}

pub fn role_names(overrides: &BTreeMap<String, String>, roles: &[Role]) -> RoleNames {
    let mut result = RoleNames::default();

    for (shortname, name) in overrides {
        match roles.iter().find(|r| &r.shortname == shortname) {
            Some(role) => {
                result.names.insert(role.id, name.clone());
            }
            None => result.invalid.push(shortname.clone()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available() -> Vec<String> {
        vec!["manual".to_string(), "self".to_string()]
    }

    #[test]
    fn test_enrolment_fields_grouped_by_index() {
        let fields = vec![
            ("enrolment_1", "manual"),
            ("enrolment_1_enrolperiod", "3600"),
            ("enrolment_1_role", "student"),
            ("enrolment_2", "self"),
            ("enrolment_2_password", "secret_word"),
            ("enrolment_x", "ignored"),
            ("enrolment_3_", "ignored"),
            ("enrolment_5", ""),
            ("fullname", "ignored"),
        ];
        let grouped = parse_enrolment_fields(fields);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&1].method.as_deref(), Some("manual"));
        assert_eq!(grouped[&1].options.len(), 2);
        assert_eq!(grouped[&2].options["password"], "secret_word");
    }

    #[test]
    fn test_option_names_may_contain_underscores() {
        let grouped = parse_enrolment_fields(vec![("enrolment_4_custom_int1", "7")]);
        assert_eq!(grouped[&4].options["custom_int1"], "7");
        assert_eq!(grouped[&4].method, None);
    }

    #[test]
    fn test_unknown_methods_dropped() {
        let grouped = parse_enrolment_fields(vec![
            ("enrolment_1", "manual"),
            ("enrolment_2", "paypal"),
            ("enrolment_3_role", "student"),
        ]);
        let data = enrolment_data(grouped, &available());
        assert_eq!(data.methods.len(), 1);
        assert!(data.methods.contains_key("manual"));
        assert_eq!(data.unknown, vec!["paypal".to_string()]);
    }

    #[test]
    fn test_role_names() {
        let roles = vec![
            Role {
                id: 3,
                shortname: "editingteacher".into(),
                name: "Teacher".into(),
            },
            Role {
                id: 5,
                shortname: "student".into(),
                name: "Student".into(),
            },
        ];
        let overrides = parse_role_fields(vec![
            ("role_student", "Learner"),
            ("role_wizard", "Gandalf"),
            ("role_", "ignored"),
            ("shortname", "ignored"),
        ]);
        let names = role_names(&overrides, &roles);
        assert_eq!(names.names.get(&5).map(String::as_str), Some("Learner"));
        assert_eq!(names.invalid, vec!["wizard".to_string()]);
    }
}
