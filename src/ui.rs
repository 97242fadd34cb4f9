//! Browser form front end. Every prediction goes through the shared [`Gateway`].

use actix_multipart::Multipart;
use actix_web::error::{InternalError, UrlencodedError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use handlebars::{Handlebars, TemplateError};
use serde_json::{json, Value};
use tracing::error;

use crate::error::{GatewayError, ValidationError};
use crate::gateway::{Gateway, ScoredUpload};
use crate::handlers::{classify_payload, UploadLimit};
use crate::models::{ClassificationResult, StarRecord, REQUIRED_COLUMNS};

pub type Templates = Handlebars<'static>;

const HTML: &str = "text/html; charset=utf-8";

/// Compiles the bundled page templates. Values are HTML-escaped on render.
pub fn templates() -> Result<Templates, TemplateError> {
    let mut hb = Handlebars::new();
    hb.register_partial("header", include_str!("../templates/header.hbs"))?;
    hb.register_partial("footer", include_str!("../templates/footer.hbs"))?;
    hb.register_template_string("index", include_str!("../templates/index.hbs"))?;
    hb.register_template_string("single", include_str!("../templates/single.hbs"))?;
    hb.register_template_string("batch", include_str!("../templates/batch.hbs"))?;
    hb.register_template_string("error", include_str!("../templates/error.hbs"))?;
    Ok(hb)
}

pub async fn index(templates: web::Data<Templates>) -> HttpResponse {
    render(
        &templates,
        "index",
        StatusCode::OK,
        &json!({ "required_columns": REQUIRED_COLUMNS }),
    )
}

pub async fn single(
    templates: web::Data<Templates>,
    gateway: web::Data<Gateway>,
    form: web::Form<StarRecord>,
) -> HttpResponse {
    let record = form.into_inner();
    let class_labels = gateway.class_labels().to_vec();
    let gateway = gateway.into_inner();
    let outcome = web::block(move || gateway.classify_record(&record))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))
        .and_then(|r| r);

    match outcome {
        Ok(result) => render(
            &templates,
            "single",
            StatusCode::OK,
            &single_context(&class_labels, &result),
        ),
        Err(e) => error_page(&templates, &e),
    }
}

pub async fn batch(
    templates: web::Data<Templates>,
    gateway: web::Data<Gateway>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> HttpResponse {
    let class_labels = gateway.class_labels().to_vec();
    match classify_payload(gateway, limit, payload).await {
        Ok(scored) => render(
            &templates,
            "batch",
            StatusCode::OK,
            &batch_context(&class_labels, &scored),
        ),
        Err(e) => error_page(&templates, &e),
    }
}

pub(crate) fn form_error_handler(err: UrlencodedError, req: &HttpRequest) -> actix_web::Error {
    let gateway_err = GatewayError::from(ValidationError::new(err.to_string()));
    let response = match req.app_data::<web::Data<Templates>>() {
        Some(templates) => error_page(templates, &gateway_err),
        None => gateway_err.error_response(),
    };
    InternalError::from_response(err, response).into()
}

/// Probabilities listed in model class order.
fn single_context(class_labels: &[String], result: &ClassificationResult) -> Value {
    let probabilities: Vec<Value> = class_labels
        .iter()
        .map(|label| {
            let p = result.probabilities.get(label).copied().unwrap_or_default();
            json!({ "label": label, "probability": format!("{p:.4}") })
        })
        .collect();
    json!({
        "predicted_type": result.predicted_type,
        "probabilities": probabilities,
    })
}

fn batch_context(class_labels: &[String], scored: &ScoredUpload) -> Value {
    let rows: Vec<Vec<String>> = scored
        .table
        .rows()
        .iter()
        .map(|row| row.cells.iter().map(ToString::to_string).collect())
        .collect();
    let predictions: Vec<Value> = scored
        .response
        .predictions
        .iter()
        .map(|prediction| {
            let probabilities: Vec<String> = class_labels
                .iter()
                .map(|label| {
                    let p = prediction.result.probabilities.get(label).copied().unwrap_or_default();
                    format!("{p:.4}")
                })
                .collect();
            json!({
                "index": prediction.index,
                "predicted_type": prediction.result.predicted_type,
                "probabilities": probabilities,
            })
        })
        .collect();
    json!({
        "columns": scored.table.columns(),
        "rows": rows,
        "class_labels": class_labels,
        "predictions": predictions,
    })
}

fn error_page(templates: &Templates, err: &GatewayError) -> HttpResponse {
    render(
        templates,
        "error",
        err.status_code(),
        &json!({ "message": err.to_string() }),
    )
}

fn render(templates: &Templates, name: &str, status: StatusCode, context: &Value) -> HttpResponse {
    match templates.render(name, context) {
        Ok(body) => HttpResponse::build(status).content_type(HTML).body(body),
        Err(e) => {
            error!(template = name, error = %e, "failed to render page");
            HttpResponse::InternalServerError().finish()
        }
    }
}
