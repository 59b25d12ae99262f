pub mod code;
pub mod mock;
pub mod sim;
pub mod traits;

pub use code::PanelErrorCode;
pub use mock::{MockOp, MockPanel, PanelCall};
pub use sim::SimulatedPanel;
pub use traits::{PanelTransport, TransportError};
