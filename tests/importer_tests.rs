use course_upload::category::{CategoryId, VIRTUAL_BASE};
use course_upload::config::AppConfig;
use course_upload::importer::{ImportMode, ImportOptions, Importer};
use course_upload::progress::SilentProgress;
use course_upload::storage::Database;
use course_upload::tracker::{PlainReporter, RunTotals, SilentReporter};
use std::fs::File;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn import(db: &Database, options: ImportOptions, contents: &str) -> RunTotals {
    let file = csv_file(contents);
    let mut importer = Importer::new(db, options).unwrap();
    importer
        .run(File::open(file.path()).unwrap(), &mut SilentReporter, &SilentProgress)
        .unwrap()
}

fn import_report(db: &Database, options: ImportOptions, contents: &str) -> String {
    let mut reporter = PlainReporter::new(Vec::new());
    let mut importer = Importer::new(db, options).unwrap();
    importer
        .run(contents.as_bytes(), &mut reporter, &SilentProgress)
        .unwrap();
    String::from_utf8(reporter.into_inner()).unwrap()
}

fn preview() -> ImportOptions {
    ImportOptions {
        preview: true,
        ..Default::default()
    }
}

#[test]
fn test_create_with_category_path_and_extras() {
    let db = Database::open_in_memory().unwrap();
    let totals = import(
        &db,
        ImportOptions::default(),
        "shortname,fullname,idnumber,category_path,enrolment_1,enrolment_1_role,enrolment_2,role_student\n\
         PHY101,Physics 101,P101,Science / Physics,manual,student,paypal,Learner\n\
         PHY102,Physics 102,,Science / Physics,,,,\n",
    );

    assert_eq!(totals.total, 2);
    assert_eq!(totals.created, 2);
    assert_eq!(totals.categories_created, 2);
    assert_eq!(totals.errors, 0);

    let course = db.get_course_by_shortname("PHY101").unwrap().unwrap();
    let physics = db.get_categories_by_name("Physics", 1).unwrap();
    assert_eq!(physics.len(), 1);
    assert_eq!(course.category, physics[0].id);
    assert_eq!(course.idnumber.as_deref(), Some("P101"));

    let enrolments = db.get_enrolments(course.id).unwrap();
    assert_eq!(enrolments.len(), 1);
    assert_eq!(enrolments["manual"]["role"], "student");

    let names = db.get_role_names(course.id).unwrap();
    assert_eq!(names.values().next().map(String::as_str), Some("Learner"));
}

#[test]
fn test_preview_writes_nothing() {
    let db = Database::open_in_memory().unwrap();
    let report = import_report(
        &db,
        preview(),
        "shortname,fullname,category_path\n\
         C1,One,Science / Physics\n\
         C2,Two,Science / Physics\n\
         C3,Three,Science / Chemistry\n",
    );

    assert_eq!(db.count_courses().unwrap(), 0);
    assert!(db.list_category_paths().unwrap().is_empty());
    assert_eq!(
        report
            .matches("Category does not exist, it will be created")
            .count(),
        3
    );
    assert!(report.contains("Course will be created"));
    assert!(report.contains("Categories to be created: 3"));
    assert!(report.contains("Courses to be created: 3"));
}

#[test]
fn test_preview_virtual_ids_are_stable_for_repeated_rows() {
    let db = Database::open_in_memory().unwrap();
    let file = csv_file("shortname,fullname,category_path\nC1,One,A / B\nC2,Two,A / B\n");
    let mut importer = Importer::new(&db, preview()).unwrap();
    let totals = importer
        .run(File::open(file.path()).unwrap(), &mut SilentReporter, &SilentProgress)
        .unwrap();

    assert_eq!(totals.categories_created, 2);
    let record = importer.context().virtual_table().get("A / B").unwrap();
    assert_eq!(record.id, CategoryId::Virtual(VIRTUAL_BASE + 2));
}

#[test]
fn test_category_creation_disabled() {
    let db = Database::open_in_memory().unwrap();
    let options = ImportOptions {
        allow_category_creation: false,
        ..Default::default()
    };
    let report = import_report(&db, options, "shortname,fullname,category_path\nC1,One,Nowhere\n");

    assert!(report.contains("2\tNOK"));
    assert!(report.contains("automatic creation is not permitted"));
    assert_eq!(db.count_courses().unwrap(), 0);
}

#[test]
fn test_category_by_id_and_idnumber() {
    let db = Database::open_in_memory().unwrap();
    let arts = db.insert_category("Arts", 0, Some("ARTS")).unwrap();
    let totals = import(
        &db,
        ImportOptions::default(),
        &format!(
            "shortname,fullname,category,category_idnumber\nA1,Art 1,{},\nA2,Art 2,,ARTS\nA3,Art 3,999,\nA4,Art 4,0,\n",
            arts.id
        ),
    );

    assert_eq!(totals.created, 2);
    assert_eq!(totals.errors, 2);
    let a2 = db.get_course_by_shortname("A2").unwrap().unwrap();
    assert_eq!(a2.category, arts.id);
}

#[test]
fn test_update_and_delete() {
    let db = Database::open_in_memory().unwrap();
    import(
        &db,
        ImportOptions::default(),
        "shortname,fullname,category_path\nC1,One,Top\nC2,Two,Top\n",
    );

    let totals = import(
        &db,
        ImportOptions {
            mode: ImportMode::CreateOrUpdate,
            allow_deletes: true,
            ..Default::default()
        },
        "shortname,fullname,category_path,delete\nC1,One renamed,Top / Sub,0\nC2,,,1\nC9,,,1\n",
    );

    assert_eq!(totals.updated, 1);
    assert_eq!(totals.deleted, 1);
    assert_eq!(totals.errors, 1);
    let c1 = db.get_course_by_shortname("C1").unwrap().unwrap();
    assert_eq!(c1.fullname, "One renamed");
    let top = db.get_categories_by_name("Top", 0).unwrap();
    let sub = db.get_categories_by_name("Sub", top[0].id).unwrap();
    assert_eq!(c1.category, sub[0].id);
    assert!(db.get_course_by_shortname("C2").unwrap().is_none());
}

#[test]
fn test_delete_requires_permission() {
    let db = Database::open_in_memory().unwrap();
    import(&db, ImportOptions::default(), "shortname,fullname,category_path\nC1,One,Top\n");

    let report = import_report(&db, ImportOptions::default(), "shortname,delete\nC1,1\n");
    assert!(report.contains("Course deletion is not allowed"));
    assert_eq!(db.count_courses().unwrap(), 1);
}

#[test]
fn test_idnumber_collision() {
    let db = Database::open_in_memory().unwrap();
    import(
        &db,
        ImportOptions::default(),
        "shortname,fullname,idnumber,category_path\nC1,One,ID1,Top\n",
    );

    let totals = import(
        &db,
        ImportOptions::default(),
        "shortname,fullname,idnumber,category_path\nC2,Two,ID1,Top\n",
    );
    assert_eq!(totals.errors, 1);

    let totals = import(
        &db,
        ImportOptions {
            mode: ImportMode::CreateAll,
            ..Default::default()
        },
        "shortname,fullname,idnumber,category_path\nC1,One again,ID1,Top\n",
    );
    assert_eq!(totals.created, 1);
    let renamed = db.get_course_by_shortname("C2").unwrap().unwrap();
    assert_eq!(renamed.idnumber.as_deref(), Some("ID2"));
}

#[test]
fn test_invalid_roles_fail_the_row() {
    let db = Database::open_in_memory().unwrap();
    let report = import_report(
        &db,
        ImportOptions::default(),
        "shortname,fullname,category_path,role_wizard,role_student\nC1,One,Top,Gandalf,Learner\n",
    );
    assert!(report.contains("Invalid roles: wizard"));
    assert_eq!(db.count_courses().unwrap(), 0);
}

#[test]
fn test_shortname_template() {
    let db = Database::open_in_memory().unwrap();
    let options = ImportOptions {
        shortname_template: Some("%+4f-%i".into()),
        ..Default::default()
    };
    import(
        &db,
        options,
        "fullname,idnumber,category_path\nbiology basics,B1,Science\n",
    );
    assert!(db.get_course_by_shortname("BIOL-B1").unwrap().is_some());
}

#[test]
fn test_semicolon_delimiter_from_config() {
    let config = AppConfig::from_toml_str("delimiter = \";\"").unwrap();
    let db = Database::open_in_memory().unwrap();
    let totals = import(
        &db,
        config.import_options().unwrap(),
        "shortname;fullname;category_path\nC1;One;Top\n",
    );
    assert_eq!(totals.created, 1);
}

#[test]
fn test_import_into_file_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("courses.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::open(path).unwrap();
        import(&db, ImportOptions::default(), "shortname,fullname,category_path\nC1,One,Top\n");
    }

    let db = Database::open(path).unwrap();
    assert_eq!(db.count_courses().unwrap(), 1);
    let categories = db.list_category_paths().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].1, "Top");
}

#[test]
fn test_row_count_mismatch_aborts() {
    let db = Database::open_in_memory().unwrap();
    let mut importer = Importer::new(&db, ImportOptions::default()).unwrap();
    let result = importer.run(
        "shortname,fullname\nC1,One,extra\n".as_bytes(),
        &mut SilentReporter,
        &SilentProgress,
    );
    assert!(matches!(result, Err(course_upload::Error::Csv(_))));
}
