use sqltmpl::{compile_template, Builder, HandlerRegistry, LexerConfig, RenderError};

fn render(tmpl: &str, setup: impl FnOnce(&mut Builder)) -> Result<(String, Vec<sqltmpl::Binding>), RenderError> {
    let cfg = LexerConfig::default();
    let reg = HandlerRegistry::with_defaults();
    let bp = compile_template(tmpl, &cfg, &reg).unwrap();
    let mut builder = Builder::new(&bp);
    setup(&mut builder);
    builder.render(&reg)
}

#[test]
fn s1_unused_optional_variable_drops_its_whole_condition() {
    let (sql, _) = render(
        "SELECT * FROM Users WHERE IsActive = 1 AND Name = ?@Name",
        |_| {},
    )
    .unwrap();
    assert_eq!(sql, "SELECT * FROM Users WHERE IsActive = 1");
}

#[test]
fn s2_mixed_required_and_optional_set_clause() {
    let (sql, _) = render(
        "UPDATE Users SET Email = @Email, Phone = ?@Phone WHERE ID = @ID",
        |b| {
            b.use_value("Email", "x").unwrap();
            b.use_value("ID", 1).unwrap();
        },
    )
    .unwrap();
    assert_eq!(sql, "UPDATE Users SET Email = @Email WHERE ID = @ID");
}

#[test]
fn s3_special_handler_expands_array_into_bindings() {
    let (sql, bindings) = render(
        "SELECT * FROM Tasks WHERE CategoryID IN (?@Cats_X)",
        |b| {
            b.use_value("Cats", vec![10i64, 20, 30]).unwrap();
        },
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM Tasks WHERE CategoryID IN (@Cats_1, @Cats_2, @Cats_3)"
    );
    let names: Vec<_> = bindings.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["Cats_1", "Cats_2", "Cats_3"]);
}

#[test]
fn s4_offset_fetch_idiom_survives_and_can_be_pruned() {
    let (sql, _) = render(
        "SELECT Name FROM Products ORDER BY ID OFFSET ?@Skip_N ROWS FETCH NEXT @Take_N ROWS ONLY",
        |b| {
            b.use_value("Skip", 10i64).unwrap();
            b.use_value("Take", 20i64).unwrap();
        },
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT Name FROM Products ORDER BY ID OFFSET 10 ROWS FETCH NEXT 20 ROWS ONLY"
    );

    let (sql, _) = render(
        "SELECT Name FROM Products ORDER BY ID OFFSET ?@Skip_N ROWS FETCH NEXT @Take_N ROWS ONLY",
        |b| {
            b.use_value("Take", 20i64).unwrap();
        },
    )
    .unwrap();
    assert_eq!(sql, "SELECT Name FROM Products ORDER BY ID");
}

#[test]
fn s5_context_join_prunes_whole_and_clause_when_partner_missing() {
    let (sql, _) = render(
        "SELECT * FROM Events WHERE Date > ?@MinDate &AND Date < ?@MaxDate",
        |b| {
            b.use_value("MinDate", "2020-01-01").unwrap();
        },
    )
    .unwrap();
    assert_eq!(sql, "SELECT * FROM Events");
}

#[test]
fn s6_dynamic_projection_shares_columns_across_a_union() {
    let (sql, _) = render(
        "?SELECT ID, Name FROM Users UNION ALL ?SELECT ID, Name FROM ArchivedUsers",
        |b| {
            b.use_name("Name").unwrap();
        },
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT Name FROM Users UNION ALL SELECT Name FROM ArchivedUsers"
    );
}

#[test]
fn empty_dynamic_projection_is_an_error() {
    let err = render("?SELECT ID, Name FROM Users", |_| {}).unwrap_err();
    assert_eq!(err, RenderError::EmptyProjection);
}

#[test]
fn required_special_handler_value_missing_is_an_error() {
    let err = render(
        "SELECT * FROM Tasks WHERE CategoryID IN (@Cats_X)",
        |_| {},
    )
    .unwrap_err();
    assert_eq!(
        err,
        RenderError::HandlerMissingValue {
            name: "Cats".into(),
            letter: 'X',
        }
    );
}

#[test]
fn forced_boundary_isolates_the_following_modifier() {
    let (sql, _) = render("SELECT ?@Skip_N ??? DISTINCT Name FROM T", |_| {}).unwrap();
    assert_eq!(sql, "SELECT DISTINCT Name FROM T");
}

#[test]
fn marker_before_when_makes_the_whole_branch_conditional() {
    let (on, _) = render(
        "SELECT CASE /*Flag*/ WHEN X=1 THEN 'a' ELSE 'b' END FROM T",
        |b| {
            b.use_name("Flag").unwrap();
        },
    )
    .unwrap();
    assert!(on.contains("WHEN X=1 THEN 'a'"));

    let (off, _) = render(
        "SELECT CASE /*Flag*/ WHEN X=1 THEN 'a' ELSE 'b' END FROM T",
        |_| {},
    )
    .unwrap();
    assert!(!off.contains("WHEN"));
    // CASE/ELSE/END are independent clauses with no marker of their own, so
    // they are unaffected by WHEN's condition.
    assert!(off.contains("CASE"));
    assert!(off.contains("ELSE 'b' END"));
}

#[test]
fn optional_special_handler_with_empty_collection_prunes_its_segment() {
    let (sql, bindings) = render(
        "SELECT * FROM Tasks WHERE CategoryID IN (?@Cats_X)",
        |b| {
            b.use_value("Cats", Vec::<i64>::new()).unwrap();
        },
    )
    .unwrap();
    assert_eq!(sql, "SELECT * FROM Tasks");
    assert!(bindings.is_empty());
}

#[test]
fn required_special_handler_with_empty_collection_is_an_error() {
    let err = render(
        "SELECT * FROM Tasks WHERE CategoryID IN (@Cats_X)",
        |b| {
            b.use_value("Cats", Vec::<i64>::new()).unwrap();
        },
    )
    .unwrap_err();
    assert_eq!(
        err,
        RenderError::HandlerEmpty {
            name: "Cats".into(),
            letter: 'X',
        }
    );
}

#[test]
fn reset_selects_clears_only_the_projection_bank() {
    let cfg = LexerConfig::default();
    let reg = HandlerRegistry::with_defaults();
    let bp = compile_template(
        "?SELECT ID, Name FROM Users WHERE Active = ?@Active",
        &cfg,
        &reg,
    )
    .unwrap();
    let mut b = Builder::new(&bp);
    b.use_name("ID").unwrap();
    b.use_value("Active", true).unwrap();
    b.reset_selects();

    // The projection column was cleared, but WHERE's optional flag was not.
    let err = b.render(&reg).unwrap_err();
    assert_eq!(err, RenderError::EmptyProjection);
}
