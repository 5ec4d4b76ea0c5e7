use trellis::config::ServerConfig;
use trellis::Server;

mod bootstrap;
mod controllers;
mod middleware;
mod models;
mod routes;

#[tokio::main]
async fn main() {
    trellis::config::load_dotenv(".");
    trellis::log::init();

    let kernel = match bootstrap::kernel() {
        Ok(kernel) => kernel,
        Err(e) => {
            tracing::error!(error = %e, "application bootstrap failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = Server::new(kernel)
        .configure(ServerConfig::from_env())
        .run()
        .await
    {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
