use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use expensedb::config::{CliArgs, Config, StorageBackendKind, Transport};
use expensedb::mcp::{Dispatcher, McpResult, ServerInfo, SseServer, StdioServer};
use expensedb::resources::CategoryFile;
use expensedb::tools::{
    AddExpenseTool, DeleteExpenseTool, ListExpensesTool, SummarizeTool, TotalExpensesTool,
    UpdateExpenseTool,
};
use expensedb_core::ExpenseStore;
use expensedb_memory::MemoryStore;
use expensedb_sqlite::SqliteStore;

#[tokio::main]
async fn main() -> McpResult<()> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_tracing(&config);

    let store: Arc<dyn ExpenseStore> = match config.storage.backend {
        StorageBackendKind::Sqlite => Arc::new(SqliteStore::new(&config.storage.path)?),
        StorageBackendKind::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = ?config.storage.backend, path = %config.storage.path, "storage ready");

    let mut dispatcher = Dispatcher::new(ServerInfo::default());
    dispatcher
        .register_tool(Arc::new(AddExpenseTool::new(store.clone())))
        .register_tool(Arc::new(ListExpensesTool::new(store.clone())))
        .register_tool(Arc::new(SummarizeTool::new(store.clone())))
        .register_tool(Arc::new(DeleteExpenseTool::new(store.clone())))
        .register_tool(Arc::new(UpdateExpenseTool::new(store.clone())))
        .register_tool(Arc::new(TotalExpensesTool::new(store)))
        .register_resource(Arc::new(CategoryFile::new(&config.resources.categories_path)));

    match cli.transport {
        Transport::Stdio => {
            info!("serving MCP over stdio");
            StdioServer::new(dispatcher).run()
        }
        Transport::Sse => SseServer::new(dispatcher, config.listen_addr()).run().await,
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is the stdio transport's protocol channel; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
