//! actix-web front for running the router outside Spin.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::{error, info};

use crate::config::Settings;
use crate::core::images::LinkImageStore;
use crate::core::store::MemoryStore;
use crate::Api;

mod adapter {
    use actix_web::HttpRequest;
    use spin_sdk::http::{Method, Request, Response};

    /// Owned copy of an actix request that can cross into the blocking pool.
    pub struct RequestParts {
        method: String,
        uri: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    /// Owned copy of a spin response.
    pub struct ResponseParts {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    pub fn request_parts(req: &HttpRequest, body: actix_web::web::Bytes) -> RequestParts {
        RequestParts {
            method: req.method().as_str().to_string(),
            uri: req.uri().to_string(),
            headers: req
                .headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
                .collect(),
            body: body.to_vec(),
        }
    }

    pub fn to_spin_request(parts: RequestParts) -> anyhow::Result<Request> {
        let method = match parts.method.as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => anyhow::bail!("unsupported method {other}"),
        };

        let mut builder = Request::builder();
        builder.method(method).uri(&parts.uri);
        for (name, value) in &parts.headers {
            builder.header(name.as_str(), value.as_str());
        }

        Ok(builder.body(parts.body).build())
    }

    pub fn response_parts(spin_resp: Response) -> ResponseParts {
        ResponseParts {
            status: *spin_resp.status(),
            headers: spin_resp
                .headers()
                .filter_map(|(name, value)| Some((name.to_string(), value.as_str()?.to_string())))
                .collect(),
            body: spin_resp.body().to_vec(),
        }
    }

    pub fn to_actix_response(parts: ResponseParts) -> actix_web::HttpResponse {
        let mut response = actix_web::HttpResponse::build(
            actix_web::http::StatusCode::from_u16(parts.status)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        );
        for (name, value) in parts.headers {
            response.append_header((name, value));
        }

        response.body(parts.body)
    }
}

/// Shared by all workers: the in-memory documents and process settings.
pub struct NativeState {
    store: MemoryStore,
    images: LinkImageStore,
    settings: Settings,
}

impl NativeState {
    pub fn new(settings: Settings) -> Self {
        Self {
            store: MemoryStore::new(),
            images: LinkImageStore,
            settings,
        }
    }

    pub fn api(&self) -> Api<'_> {
        Api::new(&self.store, &self.images, &self.settings)
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

/// Runs the router on the blocking pool; password hashing would otherwise stall the worker.
pub async fn handle_all(req: HttpRequest, body: web::Bytes, state: web::Data<NativeState>) -> HttpResponse {
    let parts = adapter::request_parts(&req, body);

    let handled = web::block(move || {
        let spin_req = adapter::to_spin_request(parts)?;
        Ok::<_, anyhow::Error>(adapter::response_parts(state.api().handle(&spin_req)))
    })
    .await;

    match handled {
        Ok(Ok(parts)) => adapter::to_actix_response(parts),
        Ok(Err(err)) => {
            error!(error = %err, "could not adapt request");
            HttpResponse::BadRequest().json(serde_json::json!({"error": "Invalid request"}))
        }
        Err(err) => {
            error!(error = %err, "request handler did not complete");
            HttpResponse::InternalServerError().json(serde_json::json!({"error": "Internal server error"}))
        }
    }
}

pub async fn run(settings: Settings) -> std::io::Result<()> {
    let addr = settings.http_addr.clone();
    let state = web::Data::new(NativeState::new(settings));

    info!("Server listening on http://{addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .default_service(web::route().to(handle_all))
    })
    .bind(addr.as_str())?
    .run()
    .await
}
