pub mod adapter;
pub mod config;
pub mod data;
pub mod error;
pub mod event;
pub mod mobile;
pub mod neighbor;
pub mod node;
pub mod packet;
pub mod path;
pub mod routing;

pub use adapter::{ALL_PEERS, Adapter, RecordingAdapter, TOPO_PREFIX};
pub use config::RouterConfig;
pub use data::{
    ControlMessage, LinkState, LinkStateCollection, MessageHello, MessageMar, MessageMau, MobileKeys,
    NextHops, RouterId,
};
pub use error::{ConfigError, DecodeError, FrameError};
pub use event::{BindingChange, Event};
pub use mobile::{MobileAddressEngine, RemoteKeys};
pub use neighbor::{Neighbor, NeighborEngine, NeighborTable};
pub use node::RouterNode;
pub use path::PathEngine;
pub use routing::{BindingTable, KeyRoutes, mobile_key_routes};
