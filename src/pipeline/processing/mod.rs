// Pipeline processing: version detection, validation, id resolution, and normalization

pub mod diagnostics;
pub mod identifiers;
pub mod normalize;
pub mod schema;
pub mod summary;
pub mod teams;
pub mod validate;
