use actix_multipart::Multipart;
use actix_web::error::JsonPayloadError;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use tracing::debug;

use crate::error::{GatewayError, ParseError, ValidationError};
use crate::gateway::{Gateway, ScoredUpload};
use crate::models::{
    ModelInfo, PredictionResponse, StarRecord, StatusResponse, REQUIRED_COLUMNS, STATUS_MESSAGE,
};
use crate::ui;

pub const UPLOAD_FIELD: &str = "file";
pub const EXPORT_FILE_NAME: &str = "star_predictions.csv";

/// Largest accepted upload body, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

/// Registers every route plus the shared gateway, UI templates and extractor
/// config. Fails only if a bundled template does not compile.
pub fn configure(
    gateway: web::Data<Gateway>,
    upload_limit: usize,
) -> Result<impl Fn(&mut web::ServiceConfig) + Clone, handlebars::TemplateError> {
    let templates = web::Data::new(ui::templates()?);
    Ok(move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(gateway.clone())
            .app_data(templates.clone())
            .app_data(web::Data::new(UploadLimit(upload_limit)))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::FormConfig::default().error_handler(ui::form_error_handler))
            .route("/", web::get().to(status))
            .route("/model", web::get().to(model_info))
            .route("/predict/single", web::post().to(predict_single))
            .route("/predict/batch", web::post().to(predict_batch))
            .route("/predict/batch/csv", web::post().to(predict_batch_csv))
            .route("/ui", web::get().to(ui::index))
            .route("/ui/single", web::post().to(ui::single))
            .route("/ui/batch", web::post().to(ui::batch));
    })
}

pub async fn status() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        message: STATUS_MESSAGE,
    })
}

pub async fn model_info(gateway: web::Data<Gateway>) -> HttpResponse {
    HttpResponse::Ok().json(ModelInfo {
        class_labels: gateway.class_labels().to_vec(),
        required_columns: REQUIRED_COLUMNS.to_vec(),
    })
}

pub async fn predict_single(
    gateway: web::Data<Gateway>,
    record: web::Json<StarRecord>,
) -> Result<HttpResponse, GatewayError> {
    let record = record.into_inner();
    let gateway = gateway.into_inner();
    let result = web::block(move || gateway.classify_record(&record))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn predict_batch(
    gateway: web::Data<Gateway>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> Result<HttpResponse, GatewayError> {
    let scored = classify_payload(gateway, limit, payload).await?;
    Ok(HttpResponse::Ok().json(scored.response))
}

pub async fn predict_batch_csv(
    gateway: web::Data<Gateway>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> Result<HttpResponse, GatewayError> {
    let class_labels = gateway.class_labels().to_vec();
    let scored = classify_payload(gateway, limit, payload).await?;
    let body = to_csv(&class_labels, &scored.response)?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(EXPORT_FILE_NAME.to_string())],
        })
        .body(body))
}

/// Reads the upload and runs the batch path on the blocking pool.
pub(crate) async fn classify_payload(
    gateway: web::Data<Gateway>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> Result<ScoredUpload, GatewayError> {
    let bytes = read_upload(payload, limit.0).await?;
    let gateway = gateway.into_inner();
    web::block(move || gateway.score_upload(&bytes))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?
}

/// Collects the `file` field of a multipart body. Falls back to the first
/// field that carries a filename. `limit` caps the whole body; other fields
/// are drained without being kept.
pub(crate) async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Vec<u8>, ParseError> {
    let mut upload: Option<Vec<u8>> = None;
    let mut received = 0usize;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ParseError::new(e.to_string()))?;
        let disposition = field.content_disposition();
        let wanted = upload.is_none()
            && (disposition.get_name() == Some(UPLOAD_FIELD) || disposition.get_filename().is_some());
        debug!(field = ?disposition.get_name(), wanted, "multipart field");

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ParseError::new(e.to_string()))?;
            received += chunk.len();
            if received > limit {
                return Err(ParseError::new(format!("upload exceeds {limit} bytes")));
            }
            if wanted {
                data.extend_from_slice(&chunk);
            }
        }
        if wanted {
            upload = Some(data);
        }
    }

    upload.ok_or_else(|| ParseError::new(format!("expected a CSV file in the '{UPLOAD_FIELD}' field")))
}

/// `Index,Predicted Type,<class...>` with one row per prediction.
pub fn to_csv(class_labels: &[String], response: &PredictionResponse) -> Result<Vec<u8>, GatewayError> {
    let internal = |e: csv::Error| GatewayError::Internal(e.to_string());
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Index".to_string(), "Predicted Type".to_string()];
    header.extend(class_labels.iter().cloned());
    writer.write_record(&header).map_err(internal)?;

    for prediction in &response.predictions {
        let mut record = vec![
            prediction.index.to_string(),
            prediction.result.predicted_type.clone(),
        ];
        record.extend(class_labels.iter().map(|label| {
            prediction
                .result
                .probabilities
                .get(label)
                .map(f64::to_string)
                .unwrap_or_default()
        }));
        writer.write_record(&record).map_err(internal)?;
    }

    writer
        .into_inner()
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let validation = ValidationError::new(format!(
        "{err} (required numeric fields: temperature, luminosity, radius, absolute_magnitude)"
    ));
    GatewayError::from(validation).into()
}
