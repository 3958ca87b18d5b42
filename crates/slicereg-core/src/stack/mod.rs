pub mod aligner;
pub mod cross_scale;
pub mod registry;

pub use aligner::{align_stack, align_stack_with_progress, registration_plan, AlignedStack, RegistrationStep};
pub use cross_scale::align_to_reference_stack;
pub use registry::MethodRegistry;
