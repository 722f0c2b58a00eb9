use super::{FieldPath, FieldPathSegment};

#[test]
fn root_renders_as_dollar() {
    let path = FieldPath::root();
    assert!(path.is_root());
    assert_eq!(path.to_string(), "$");
}

#[test]
fn builders_do_not_mutate_the_base_path() {
    let base = FieldPath::root().key("plan_model");
    let child = base.key("children").index(2).key("entry_criteria").index(0);
    assert_eq!(base.to_string(), "$.plan_model");
    assert_eq!(child.to_string(), "$.plan_model.children[2].entry_criteria[0]");
    assert_eq!(
        child.segments()[2],
        FieldPathSegment::Index(2)
    );
}
