//! Request adapters: translate external HTTP inputs into engine calls and
//! engine results back into the external response schema. Policy lives in
//! the engine; this layer is thin by design.

pub mod elevation;
