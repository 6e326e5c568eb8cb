//! Fixed-rate currency conversion agent

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    protocol::{
        agent::{AgentCapabilities, AgentCard, AgentSkill},
        error::{A2AError, A2AResult},
        message::Part,
    },
    server::{AgentExecutor, ExecutionContext, TaskUpdater},
};

const USD_VND_RATE: f64 = 25_400.0;

/// Validated `{amount, from, to}` payload
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

impl ConversionRequest {
    /// Parse the structured payload of a message
    ///
    /// # Errors
    ///
    /// `A2AError::Validation` with a caller-facing message when the payload is
    /// missing or malformed.
    pub fn parse(payload: Option<&Value>) -> A2AResult<Self> {
        let data = payload
            .filter(|v| v.as_object().is_some_and(|fields| !fields.is_empty()))
            .ok_or_else(|| A2AError::Validation("Missing or invalid currency data.".into()))?;

        let amount = match data.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            None => Some(0.0),
            _ => None,
        }
        .filter(|a| a.is_finite())
        .ok_or_else(|| A2AError::Validation("Invalid amount or currency code.".into()))?;

        let currency = |key: &str| -> A2AResult<String> {
            match data.get(key) {
                Some(Value::String(code)) => Ok(code.trim().to_uppercase()),
                None | Some(Value::Null) => Ok(String::new()),
                Some(_) => Err(A2AError::Validation("Invalid amount or currency code.".into())),
            }
        };
        let from = currency("from")?;
        let to = currency("to")?;

        if amount <= 0.0 || from.is_empty() || to.is_empty() {
            return Err(A2AError::Validation(
                "Amount must be positive and currencies required.".into(),
            ));
        }

        Ok(Self { amount, from, to })
    }

    /// Rate from the fixed table; unknown pairs convert one to one
    pub fn rate(&self) -> f64 {
        match (self.from.as_str(), self.to.as_str()) {
            ("USD", "VND") => USD_VND_RATE,
            ("VND", "USD") => 1.0 / USD_VND_RATE,
            _ => 1.0,
        }
    }

    pub fn convert(&self) -> f64 {
        self.amount * self.rate()
    }

    /// Final status text
    pub fn summary(&self) -> String {
        format!(
            "Conversion completed!\n{} {} = {} {}\nExchange rate: {}",
            group_thousands(self.amount, 2),
            self.from,
            format_result(self.convert()),
            self.to,
            format_rate(self.rate()),
        )
    }
}

/// Whole units for large results, four decimals below one
fn format_result(value: f64) -> String {
    if value.abs() >= 1.0 {
        group_thousands(value, 0)
    } else {
        group_thousands(value, 4)
    }
}

fn format_rate(rate: f64) -> String {
    if rate >= 1.0 {
        group_thousands(rate, 4)
    } else {
        group_thousands(rate, 8)
    }
}

/// Format with a fixed number of decimals and comma-separated thousands
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::with_capacity(formatted.len() + whole.len() / 3 + 1);
    if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn currency_skill() -> AgentSkill {
    AgentSkill::new(
        "currency_conversion",
        "currency_conversion",
        "Convert currency from one unit to another",
    )
    .with_tags(["finance", "currency"])
}

/// Currency conversion executor
///
/// Emits a `working` status and a `conversion-progress` artifact, waits for the
/// configured delay, then completes with the conversion summary. Invalid payloads
/// fail before any progress is reported.
#[derive(Debug, Clone)]
pub struct CurrencyExecutor {
    delay: Duration,
}

impl CurrencyExecutor {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(400),
        }
    }

    /// Simulated processing time between progress and the result
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Public card
    pub fn card(url: impl Into<String>) -> AgentCard {
        AgentCard::new("CurrencyExpert", "Financial agent for currency conversion", url)
            .with_version("1.0.0")
            .with_capabilities(AgentCapabilities::new().with_streaming())
            .with_skill(currency_skill())
            .with_extended_card()
            .with_input_modes(["text", "data"])
    }

    /// Card served to authenticated callers
    pub fn extended_card(url: impl Into<String>) -> AgentCard {
        AgentCard::new(
            "CurrencyExpert - Extended",
            "Extended capabilities for authenticated users",
            url,
        )
        .with_version("1.0.0")
        .with_capabilities(AgentCapabilities::new().with_streaming())
        .with_skill(
            currency_skill()
                .with_example("Convert 100 USD to VND")
                .with_example("How much is 1,000,000 VND in USD?"),
        )
        .with_extended_card()
        .with_input_modes(["text", "data"])
    }
}

impl Default for CurrencyExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentExecutor for CurrencyExecutor {
    async fn execute(&self, ctx: ExecutionContext, updater: TaskUpdater) -> A2AResult<()> {
        let request = ConversionRequest::parse(ctx.payload()?.as_ref())?;

        updater.start_work("Processing currency conversion...").await?;

        tracing::info!(
            task_id = %ctx.task_id(),
            amount = request.amount,
            from = %request.from,
            to = %request.to,
            "converting"
        );
        updater
            .add_artifact(
                "conversion-progress",
                vec![Part::text(format!(
                    "Converting {} {} to {}...",
                    group_thousands(request.amount, 2),
                    request.from,
                    request.to
                ))],
            )
            .await?;

        tokio::time::sleep(self.delay).await;

        updater.complete(request.summary()).await
    }
}
