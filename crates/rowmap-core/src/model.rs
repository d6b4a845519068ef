use serde::de::DeserializeOwned;

///
/// Model
///
/// Static field-layout descriptor for a mapping target type.
///
/// Rust has no runtime reflection, so every type that participates in
/// aggregate mapping declares its field names up front. The builder uses
/// `FIELDS` for auto-mapping and child field maps; `NAME` appears in plan
/// diagnostics and the default column prefix (`lowercase(NAME) + "__"`).
///
/// `FIELDS` must list every attribute the mapping layer may populate,
/// including composite attributes (collections, references, value
/// objects) — those are excluded from auto-mapping by their plan
/// declarations, not by omission here.
///

pub trait Model: DeserializeOwned {
    const NAME: &'static str;
    const FIELDS: &'static [&'static str];
}
