/// Writes SQL fragments to a formatter, in order.
///
/// Each fragment implements `ToSql`. Bound values are written with `Bind`,
/// which pushes the value and emits its placeholder in one step.
macro_rules! fmt {
    ($f:expr, $( $fragments:expr )*) => {{
        $(
            $fragments.to_sql($f);
        )*
    }};
}
