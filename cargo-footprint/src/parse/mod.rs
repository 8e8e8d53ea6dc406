pub mod lowering;
pub mod memory;
pub mod source;
pub mod tflite;

pub use lowering::lower;
pub use memory::InMemoryModel;
pub use source::{ElementType, ModelSource, Opcode, OperatorOptions, RawLayer, RawTensor};
pub use tflite::TfliteModel;
