//! Turn measurement records into the HTML results table.
//!
//! Rendering is pure: the same records always produce the same bytes, which
//! is what makes caching the output by source digest sound.

use askama::Template;

use crate::{
    domain::results::{FieldValue, MeasurementRecord, RecordExtra, parse_records},
    presentation::views::{
        CellView, CommentPopoverTemplate, PopoverTitleTemplate, PopoverView, ResultRowView,
        ResultsTemplate, ResultsView, TtlAnomalyRowView, TtlPopoverTemplate,
    },
};

use super::error::AppError;

const NOT_FOUND: &str = "not found";

/// Decode a result file and render it as a full HTML page.
pub fn render_result_bytes(title: &str, bytes: &[u8]) -> Result<String, AppError> {
    let records = parse_records(bytes)?;
    render_records(title, &records)
}

pub fn render_records(title: &str, records: &[MeasurementRecord]) -> Result<String, AppError> {
    let rows = records
        .iter()
        .map(build_row)
        .collect::<Result<Vec<_>, _>>()?;

    let template = ResultsTemplate {
        view: ResultsView {
            title: title.to_string(),
            rows,
        },
    };
    Ok(template.render()?)
}

fn build_row(record: &MeasurementRecord) -> Result<ResultRowView, AppError> {
    let extra = record.extra.as_ref();
    let url = record.url.as_str();

    let status = record.status.as_ref().map(|status| CellView {
        class: status.status_style().as_class().to_string(),
        text: status.to_string(),
        title: record.status_comment.clone().unwrap_or_default(),
        popover: None,
    });

    let block_page = commented_cell(
        record.block_page.as_ref(),
        "Block page",
        url,
        extra.and_then(|e| e.block_page_comment.as_deref()),
    )?;
    let dns_tampering = commented_cell(
        record.dns_tampering.as_ref(),
        "DNS tampering",
        url,
        extra.and_then(|e| e.dns_tampering_comment.as_deref()),
    )?;
    let sequence_number_anomaly = commented_cell(
        record.sequence_number_anomaly.as_ref(),
        "Sequence number anomaly",
        url,
        extra.and_then(|e| e.sequence_number_anomaly_comment.as_deref()),
    )?;

    let ttl_anomaly = match record.ttl_anomaly.as_ref() {
        Some(value) => {
            let content = match extra {
                Some(extra) => ttl_popover(extra)?,
                None => None,
            };
            Some(flag_cell(value, "TTL anomaly", url, content)?)
        }
        None => None,
    };

    Ok(ResultRowView {
        url: record.url.clone(),
        url_comment: record.url_comment.clone().unwrap_or_default(),
        cells: vec![
            status,
            block_page,
            dns_tampering,
            sequence_number_anomaly,
            ttl_anomaly,
        ],
    })
}

fn commented_cell(
    value: Option<&FieldValue>,
    label: &str,
    url: &str,
    comment: Option<&str>,
) -> Result<Option<CellView>, askama::Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    let content = match comment.filter(|c| !c.is_empty()) {
        Some(comment) => Some(CommentPopoverTemplate { comment }.render()?),
        None => None,
    };
    flag_cell(value, label, url, content).map(Some)
}

/// A cell for an interference flag. With popover content the cell also gets
/// the `note_<style>` corner marker.
fn flag_cell(
    value: &FieldValue,
    label: &str,
    url: &str,
    popover_content: Option<String>,
) -> Result<CellView, askama::Error> {
    let style = value.anomaly_style().as_class();

    let Some(content_html) = popover_content else {
        return Ok(CellView {
            class: style.to_string(),
            text: value.to_string(),
            title: String::new(),
            popover: None,
        });
    };

    let title_html = PopoverTitleTemplate { label, url }.render()?;
    Ok(CellView {
        class: format!("{style} note_{style}"),
        text: value.to_string(),
        title: String::new(),
        popover: Some(PopoverView {
            title_html,
            content_html,
        }),
    })
}

/// Popover body for the TTL column. Only records that carry a
/// `TTL anomalies` list get one.
fn ttl_popover(extra: &RecordExtra) -> Result<Option<String>, askama::Error> {
    let Some(anomalies) = extra.ttl_anomalies.as_ref() else {
        return Ok(None);
    };

    let or_not_found =
        |value: Option<i64>| value.map_or_else(|| NOT_FOUND.to_string(), |v| v.to_string());

    let template = TtlPopoverTemplate {
        syn_ack_ipid: or_not_found(extra.syn_ack_ipid),
        syn_ack_ttl: or_not_found(extra.syn_ack_ttl),
        anomalies: anomalies
            .iter()
            .enumerate()
            .map(|(index, anomaly)| TtlAnomalyRowView {
                number: index + 1,
                ipid: anomaly.ipid,
                ttl: anomaly.ttl,
                rst_class: anomaly.rst_injection.anomaly_style().as_class(),
                rst_text: anomaly.rst_injection.to_string(),
            })
            .collect(),
    };
    template.render().map(Some)
}
