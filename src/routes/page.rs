//! HTML form front end.
//!
//! - GET /   empty form
//! - POST /  form fields `city` and `date`, renders the result below the form

use axum::extract::State;
use axum::response::Html;
use axum::Form;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::helpers::escape_html;
use crate::services::period::today_in;
use crate::services::pipeline::{RequestContext, WeatherPipeline};

#[derive(Debug, Deserialize)]
pub struct SummaryForm {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub date: String,
}

pub async fn index(State(pipeline): State<WeatherPipeline>) -> Html<String> {
    let today = today_in(&pipeline.timezone());
    Html(render_page(None, today))
}

pub async fn submit(
    State(pipeline): State<WeatherPipeline>,
    Form(form): Form<SummaryForm>,
) -> Html<String> {
    let today = today_in(&pipeline.timezone());
    let ctx = pipeline.run_at(&form.city, &form.date, today).await;
    Html(render_page(Some(&ctx), today))
}

/// Render the full page. Every interpolated value is escaped.
pub fn render_page(ctx: Option<&RequestContext>, today: NaiveDate) -> String {
    let city_value = ctx.map(|c| c.city_input.as_str()).unwrap_or("");
    let date_value = ctx
        .map(|c| c.date_input.clone())
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

    let mut body = String::new();
    if let Some(ctx) = ctx {
        body.push_str(&render_result(ctx));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Weather Digest</title>
<style>
body {{ font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }}
.notice {{ color: #1d5fa8; }}
.error {{ color: #b3261e; }}
.stale {{ color: #8a6d00; }}
table {{ border-collapse: collapse; }}
td, th {{ padding: 0.2rem 0.8rem; text-align: left; }}
</style>
</head>
<body>
<h1>Weather Digest</h1>
<form method="post" action="/">
<label>City <input name="city" value="{city}" required></label>
<label>Date <input name="date" type="date" value="{date}" required></label>
<button type="submit">Explain</button>
</form>
{body}
</body>
</html>
"#,
        city = escape_html(city_value),
        date = escape_html(&date_value),
        body = body,
    )
}

fn render_result(ctx: &RequestContext) -> String {
    let mut out = String::new();

    if let Some(notice) = &ctx.notice {
        out.push_str(&format!(r#"<p class="notice">{}</p>"#, escape_html(notice)));
    }
    if let Some(err) = &ctx.error {
        out.push_str(&format!(
            r#"<p class="error">{}</p>"#,
            escape_html(&err.to_string())
        ));
        return out;
    }

    out.push_str(&format!("<h2>{}</h2>", escape_html(&ctx.city)));
    if let Some(summary) = &ctx.summary {
        out.push_str(&format!("<p>{}</p>", escape_html(summary)));
    }

    if let Some(selection) = &ctx.station {
        out.push_str(&format!(
            "<p>Station: {} ({:.0} km away)</p>",
            escape_html(&selection.station.name),
            selection.distance_km
        ));
        if selection.stale {
            out.push_str(
                r#"<p class="stale">No station reports up to this date; showing the nearest one.</p>"#,
            );
        }
    }

    if let Some(digest) = &ctx.digest {
        out.push_str(&format!(
            "<p>Min {} °C · Max {} °C · Mean {} °C ({} readings)</p>",
            digest.min, digest.max, digest.mean, digest.count
        ));
    }

    if !ctx.observations.is_empty() {
        out.push_str("<table><tr><th>Time</th><th>°C</th></tr>");
        for obs in &ctx.observations {
            let time = obs
                .local_time
                .clone()
                .unwrap_or_else(|| obs.timestamp_ms.to_string());
            let value = match &obs.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&time),
                escape_html(&value)
            ));
        }
        out.push_str("</table>");
    }

    if let Some(url) = &ctx.source_url {
        out.push_str(&format!(
            "<p><small>Source: {}</small></p>",
            escape_html(url)
        ));
    }

    out
}
