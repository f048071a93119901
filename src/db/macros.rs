/// Append one optional column to a dynamic `UPDATE ... SET` clause.
///
/// When the value is `Some`, its (optionally mapped) value is boxed onto
/// `params` and `"column = ?N"` is pushed onto `sets`, where `N` is the
/// parameter's 1-based position. `params` must already hold every
/// parameter that precedes the SET fields.
///
/// # Usage
///
/// ```ignore
/// let mut sets = vec!["updated_at = ?1".to_string()];
/// let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];
/// push_field!(input.name, "name", sets, params, |v: String| v.trim().to_string());
/// push_field!(input.capacity, "capacity", sets, params);
/// ```
#[macro_export]
macro_rules! push_field {
    ($field:expr, $col:literal, $sets:expr, $params:expr) => {
        $crate::push_field!($field, $col, $sets, $params, |v| v)
    };
    ($field:expr, $col:literal, $sets:expr, $params:expr, $map:expr) => {
        if let Some(value) = $field {
            $params.push(Box::new(($map)(value)) as Box<dyn rusqlite::types::ToSql>);
            $sets.push(format!("{} = ?{}", $col, $params.len()));
        }
    };
}
