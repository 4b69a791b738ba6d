/// What a custom directive expands into.
///
/// Expression and statement sources are parsed by the compiler exactly as
/// if they had been written in the template, so `Echo("name | upper")`
/// goes through the filter pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Literal text, emitted as-is.
    Text(String),
    /// An expression echoed with HTML escaping.
    Echo(String),
    /// An expression echoed without escaping.
    Raw(String),
    /// `;`-separated statements executed for their effect.
    Statements(String),
}
