//! 工具箱：注册表、带超时与审计的执行器、网页搜索

pub mod executor;
pub mod registry;
pub mod web_search;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use web_search::{SearchOutcome, SearchProvider, TavilySearch, WebSearchTool, TAVILY_ENDPOINT};
