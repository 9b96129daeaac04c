use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde_json::json;
use shared::{PredictionResponse, TumorClass};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::inference::Classifier;
use crate::pages::Pages;
use crate::session::{SESSION_COOKIE, SessionStore};
use crate::storage::upload_store::{StorageError, UploadStore};

/// Everything the handlers share, registered as `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub classifier: web::Data<dyn Classifier>,
    pub uploads: web::Data<UploadStore>,
    pub sessions: web::Data<SessionStore>,
    pub pages: web::Data<Pages>,
}

impl AppState {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        uploads: UploadStore,
        sessions: SessionStore,
        pages: Pages,
    ) -> Self {
        Self {
            classifier: web::Data::from(classifier),
            uploads: web::Data::new(uploads),
            sessions: web::Data::new(sessions),
            pages: web::Data::new(pages),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.classifier.clone())
            .app_data(self.uploads.clone())
            .app_data(self.sessions.clone())
            .app_data(self.pages.clone());
        configure_routes(cfg, &self.uploads);
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, uploads: &UploadStore) {
    cfg.service(web::resource("/predict").route(web::post().to(predict)))
        .service(
            web::resource("/")
                .route(web::get().to(index))
                .route(web::post().to(upload)),
        )
        .service(web::resource("/pred_page").route(web::get().to(pred_page)))
        .service(web::resource("/empty_page").route(web::get().to(empty_page)))
        .service(web::resource("/health").route(web::get().to(health_check)))
        .service(Files::new("/static/images", uploads.dir()));
}

struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

/// Drains the whole multipart body and keeps the first field named `name`.
async fn read_file_field(
    payload: &mut Multipart,
    name: &'static str,
    max_size: usize,
) -> Result<UploadedFile, AppError> {
    let mut found = None;

    while let Some(mut field) = payload.try_next().await? {
        let wanted = found.is_none() && field.name() == Some(name);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if wanted {
                if data.len() + chunk.len() > max_size {
                    return Err(StorageError::FileTooLarge.into());
                }
                data.extend_from_slice(&chunk);
            }
        }
        if wanted {
            found = Some(UploadedFile { filename, data });
        }
    }

    found.ok_or(AppError::MissingField(name))
}

async fn run_classifier(
    classifier: &web::Data<dyn Classifier>,
    image: Vec<u8>,
) -> Result<TumorClass, AppError> {
    let classifier = classifier.clone().into_inner();
    let class = web::block(move || classifier.classify(&image)).await??;
    Ok(class)
}

fn session_id(req: &HttpRequest) -> Option<Uuid> {
    req.cookie(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

async fn predict(
    classifier: web::Data<dyn Classifier>,
    uploads: web::Data<UploadStore>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let file = read_file_field(&mut payload, "file", uploads.max_size()).await?;
    let class = run_classifier(&classifier, file.data).await?;
    info!("Predicted {} for {:?}", class, file.filename);
    Ok(HttpResponse::Ok().json(PredictionResponse::from(class)))
}

async fn index(pages: web::Data<Pages>) -> Result<HttpResponse, AppError> {
    Ok(html(pages.index()?))
}

/// Saves the upload, classifies it and returns the stored filename with its
/// class. `None` means the form was submitted without a file.
async fn store_and_classify(
    payload: &mut Multipart,
    classifier: &web::Data<dyn Classifier>,
    uploads: &UploadStore,
) -> Result<Option<(String, TumorClass)>, AppError> {
    let file = read_file_field(payload, "bt_image", uploads.max_size()).await?;
    if file.filename.is_empty() {
        return Ok(None);
    }

    let filename = UploadStore::accept_filename(&file.filename)?;
    uploads.save(&filename, &file.data)?;

    let classified = match uploads.read(&filename) {
        Ok(image) => run_classifier(classifier, image).await,
        Err(e) => Err(e.into()),
    };
    match classified {
        Ok(class) => Ok(Some((filename, class))),
        Err(e) => {
            if let Err(cleanup) = uploads.delete(&filename) {
                warn!("Could not remove unclassified upload {}: {}", filename, cleanup);
            }
            Err(e)
        }
    }
}

async fn upload(
    req: HttpRequest,
    mut payload: Multipart,
    classifier: web::Data<dyn Classifier>,
    uploads: web::Data<UploadStore>,
    sessions: web::Data<SessionStore>,
    pages: web::Data<Pages>,
) -> Result<HttpResponse, AppError> {
    match store_and_classify(&mut payload, &classifier, &uploads).await {
        Ok(Some((filename, class))) => {
            info!("Predicted {} for upload {}", class, filename);
            let id =
                sessions.record_prediction(session_id(&req), filename, class.label().to_string());
            Ok(HttpResponse::SeeOther()
                .insert_header((header::LOCATION, "/pred_page"))
                .cookie(session_cookie(id))
                .finish())
        }
        Ok(None) => Ok(html(pages.index()?)),
        Err(AppError::Storage(e @ StorageError::InvalidFormat(_))) => {
            warn!("Rejected upload: {}", e);
            Ok(html(pages.index()?))
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            Ok(html(pages.index()?))
        }
    }
}

async fn pred_page(
    req: HttpRequest,
    sessions: web::Data<SessionStore>,
    pages: web::Data<Pages>,
) -> Result<HttpResponse, AppError> {
    let entry = session_id(&req).and_then(|id| sessions.get(id));
    let pred = entry.as_ref().and_then(|e| e.pred_label.as_deref());
    let f_name = entry.as_ref().and_then(|e| e.filename.as_deref());
    Ok(html(pages.prediction(pred, f_name)?))
}

async fn empty_page(
    req: HttpRequest,
    uploads: web::Data<UploadStore>,
    sessions: web::Data<SessionStore>,
) -> HttpResponse {
    match session_id(&req).and_then(|id| sessions.clear_prediction(id)) {
        Some(filename) => match uploads.delete(&filename) {
            Ok(()) => info!("Deleted upload {}", filename),
            Err(e) => warn!("Could not delete upload {}: {}", filename, e),
        },
        None => warn!("No uploaded file to delete for this session"),
    }
    redirect("/")
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "OK" }))
}
