/// A persisted course category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub parent: i64,
    pub name: String,
    pub idnumber: Option<String>,
    pub depth: i64,
    /// Materialised id path, e.g. `/3/7`.
    pub path: String,
}

/// A persisted course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: i64,
    pub category: i64,
    pub shortname: String,
    pub fullname: String,
    pub idnumber: Option<String>,
    pub summary: Option<String>,
}

/// Values written when creating or updating a course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseData {
    pub category: i64,
    pub shortname: String,
    pub fullname: String,
    pub idnumber: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub shortname: String,
    pub name: String,
}
