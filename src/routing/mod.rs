//! Request routing: pattern matching, the ordered route table and the
//! dispatcher that gates handlers behind bearer-token auth.

pub mod context;
pub mod dispatcher;
pub mod matcher;
pub mod table;

pub use context::{RequestBody, RequestContext, ResponseBody};
pub use dispatcher::{app, DispatchResponse, Dispatcher, InboundRequest};
pub use matcher::{match_path, PathMatch, PathParams, PathPattern};
pub use table::{Handler, RouteDescriptor, RouteTable};
