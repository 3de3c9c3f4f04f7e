use std::fmt::Write as _;

use crate::{Alert, AlertType};

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub struct EmailTemplate;

impl EmailTemplate {
    pub fn render(alert: &Alert) -> String {
        let body_content = match &alert.alert_type {
            AlertType::PipelineCompleted {
                run_date,
                instruments_scanned,
                opportunities,
                models_queued,
                warnings,
                execution_time_seconds,
                report_path,
                top_picks,
            } => {
                let mut rows = String::new();
                for (i, pick) in top_picks.iter().enumerate() {
                    let signal_color = match pick.signal.as_str() {
                        "BUY" => "#22c55e",
                        "SELL" => "#ef4444",
                        _ => "#64748b",
                    };
                    let _ = write!(
                        rows,
                        r#"<tr><td style="padding:6px 12px;">{rank}</td><td style="padding:6px 12px;font-weight:600;">{symbol}</td><td style="padding:6px 12px;color:{signal_color};">{signal}</td><td style="padding:6px 12px;">{conf:.0}%</td><td style="padding:6px 12px;">{score:.1}</td></tr>"#,
                        rank = i + 1,
                        symbol = escape(&pick.symbol),
                        signal = escape(&pick.signal),
                        conf = pick.confidence,
                        score = pick.opportunity_score,
                    );
                }
                let warn_color = if *warnings > 0 { "#f97316" } else { "#334155" };
                format!(
                    r#"<div style="background:#1e293b;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">Nightly Pipeline &mdash; {run_date}</div>
<table style="width:100%;border-collapse:collapse;">
  <tr><td style="padding:8px 12px;color:#94a3b8;">Instruments scanned</td><td style="padding:8px 12px;font-weight:600;">{instruments_scanned}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Opportunities</td><td style="padding:8px 12px;font-weight:600;">{opportunities}</td></tr>
  <tr><td style="padding:8px 12px;color:#94a3b8;">Models queued</td><td style="padding:8px 12px;font-weight:600;">{models_queued}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Warnings</td><td style="padding:8px 12px;font-weight:600;color:{warn_color};">{warnings}</td></tr>
  <tr><td style="padding:8px 12px;color:#94a3b8;">Execution time</td><td style="padding:8px 12px;font-weight:600;">{execution_time_seconds:.1}s</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Report</td><td style="padding:8px 12px;">{report}</td></tr>
</table>
<table style="width:100%;border-collapse:collapse;margin-top:8px;">
  <tr style="background:#f1f5f9;color:#64748b;"><th align="left" style="padding:6px 12px;">#</th><th align="left" style="padding:6px 12px;">Symbol</th><th align="left" style="padding:6px 12px;">Signal</th><th align="left" style="padding:6px 12px;">Conf</th><th align="left" style="padding:6px 12px;">Score</th></tr>
  {rows}
</table>"#,
                    run_date = escape(run_date),
                    report = escape(report_path),
                )
            }
            AlertType::PipelineFailed {
                phase,
                error,
                traceback,
            } => {
                let trace: String = traceback
                    .iter()
                    .map(|line| format!("<li>{}</li>", escape(line)))
                    .collect();
                format!(
                    r#"<div style="background:#ef4444;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">NIGHTLY PIPELINE FAILED</div>
<div style="padding:16px 20px;">
  <p style="color:#ef4444;font-weight:600;font-size:16px;margin:0 0 8px;">Failed during {phase}</p>
  <p style="color:#334155;margin:0 0 8px;">{error}</p>
  <ul style="color:#64748b;font-family:monospace;font-size:12px;margin:0;">{trace}</ul>
</div>"#,
                    phase = escape(phase),
                    error = escape(error),
                )
            }
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          {msg}
          <br>Sent at {ts} UTC
        </p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">InvestIQ Nightly Pipeline</p>
  </td></tr>
</table>
</body>
</html>"#,
            msg = escape(&alert.message),
            ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }

    /// Plain-text alternative for mail clients without HTML.
    pub fn render_text(alert: &Alert) -> String {
        let mut out = format!("{}\n\n", alert.title);
        match &alert.alert_type {
            AlertType::PipelineCompleted {
                run_date,
                instruments_scanned,
                opportunities,
                models_queued,
                warnings,
                report_path,
                top_picks,
                ..
            } => {
                let _ = writeln!(out, "Run date: {run_date}");
                let _ = writeln!(
                    out,
                    "Scanned: {instruments_scanned}  Opportunities: {opportunities}  \
                     Models queued: {models_queued}  Warnings: {warnings}"
                );
                let _ = writeln!(out, "Report: {report_path}\n");
                for (i, pick) in top_picks.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "{:>2}. {:<6} {:<4} conf {:>3.0}%  score {:.1}",
                        i + 1,
                        pick.symbol,
                        pick.signal,
                        pick.confidence,
                        pick.opportunity_score
                    );
                }
            }
            AlertType::PipelineFailed {
                phase,
                error,
                traceback,
            } => {
                let _ = writeln!(out, "Phase: {phase}\nError: {error}");
                for line in traceback {
                    let _ = writeln!(out, "  caused by: {line}");
                }
            }
        }
        if !alert.message.is_empty() {
            let _ = write!(out, "\n{}\n", alert.message);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_template_escapes_error_text() {
        let alert = Alert::new(
            AlertType::PipelineFailed {
                phase: "report_generation".into(),
                error: "write <report> failed".into(),
                traceback: vec!["Permission denied (os error 13)".into()],
            },
            "Nightly pipeline failed",
            "",
        );

        let html = EmailTemplate::render(&alert);
        assert!(html.contains("Failed during report_generation"));
        assert!(html.contains("write &lt;report&gt; failed"));

        let text = EmailTemplate::render_text(&alert);
        assert!(text.contains("caused by: Permission denied"));
    }
}
