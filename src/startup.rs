use std::{net::TcpListener, sync::Arc};

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;

use crate::{
    routes::{default_route, search_route},
    services::PipelineOrchestrator,
};

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    orchestrator: Arc<PipelineOrchestrator>,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let orchestrator = web::Data::from(orchestrator);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::health_check)
            .service(web::scope("/search").service(search_route::start_search))
            .app_data(db_pool.clone())
            .app_data(orchestrator.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
