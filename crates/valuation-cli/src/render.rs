use valuation_core::{CompanyFundamentals, ValuationResult, Verdict};

/// Human-readable report for one valuation.
pub fn render_text(result: &ValuationResult) -> String {
    let mut out = format!(
        "{} ({}) · {}",
        result.name,
        result.ticker,
        result.industry.label()
    );
    if !result.as_of_period.is_empty() {
        out.push_str(&format!(" · consensus {}", result.as_of_period));
    }
    out.push('\n');
    out.push_str(&verdict_line(result));
    out.push_str("\n\n");

    out.push_str(&format!(
        "  Current price   {} KRW ({})\n",
        group_thousands(result.current_price),
        result.quote_date
    ));
    match result.fair_value {
        Some(fair) => {
            let fair = fair.trunc() as i64;
            out.push_str(&format!(
                "  Fair value      {} KRW ({})\n",
                group_thousands(fair),
                signed_amount(fair - result.current_price)
            ));
        }
        None => out.push_str("  Fair value      n/a\n"),
    }
    out.push_str(&format!(
        "  Weights         DCF {:.0}% / Multiples {:.0}%\n",
        result.dcf_weight * 100.0,
        result.multiple_weight * 100.0
    ));
    out.push_str(&format!("  DCF value       {} KRW\n", group_thousands(result.dcf_value)));
    match result.multiple_value {
        Some(value) => out.push_str(&format!(
            "  Multiple value  {} KRW  {}\n",
            group_thousands(value),
            result.explanation
        )),
        None => out.push_str(&format!("  Multiple value  n/a  ({})\n", result.explanation)),
    }

    out.push_str("\nMarket multiples\n");
    for multiple in &result.market_multiples {
        let value = match multiple.value {
            Some(v) => format!("{:.2}x", v),
            None => "n/a".to_string(),
        };
        let role = if multiple.is_core { "core" } else { "auxiliary" };
        out.push_str(&format!("  {:<10} {:>9}  {}\n", multiple.metric.label(), value, role));
    }

    out.push_str("\nInputs\n");
    out.push_str(&format!(
        "  EPS {} · BPS {} · cash flow/share {} · growth {}%\n",
        group_thousands(result.earnings_per_share.trunc() as i64),
        group_thousands(result.book_value_per_share.trunc() as i64),
        group_thousands(result.cash_flow_per_share),
        result.growth_rate
    ));

    out
}

fn verdict_line(result: &ValuationResult) -> String {
    match (result.verdict, result.upside_percent) {
        (Verdict::NotAssessable, _) | (_, None) => "Verdict: NOT ASSESSABLE".to_string(),
        (verdict, Some(upside)) => format!("Verdict: {} ({:+.1}%)", verdict.to_label().to_uppercase(), upside),
    }
}

/// Companies covered by the active fundamentals tables, one per line.
pub fn render_company_list(companies: &[CompanyFundamentals]) -> String {
    let mut out = String::new();
    for company in companies {
        out.push_str(&format!(
            "{}  {:<14} {}\n",
            company.ticker,
            company.name,
            company.industry.label()
        ));
    }
    out
}

fn signed_amount(n: i64) -> String {
    if n >= 0 {
        format!("+{}", group_thousands(n))
    } else {
        group_thousands(n)
    }
}

/// 1234567 -> "1,234,567"
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
