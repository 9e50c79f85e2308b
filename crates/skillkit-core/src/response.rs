//! Outbound response model.
//!
//! Speech is always sent as SSML. [`ResponseBuilder`] wraps plain text in a
//! `<speak>` element the same way for output speech and reprompts.

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;

/// Envelope version written into every response.
pub const RESPONSE_VERSION: &str = "1.0";

/// The full outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub version: String,
    /// Attributes the platform hands back on the next request of the session.
    #[serde(default)]
    pub session_attributes: Attributes,
    pub response: Response,
}

/// The speech, card and session flags of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    pub should_end_session: bool,
}

/// Spoken output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputSpeech {
    PlainText { text: String },
    #[serde(rename = "SSML")]
    Ssml { ssml: String },
}

impl OutputSpeech {
    /// Wraps `speech` in a `<speak>` element.
    pub fn ssml(speech: &str) -> Self {
        Self::Ssml {
            ssml: format!("<speak> {speech} </speak>"),
        }
    }
}

/// Speech played when the user does not answer an `ask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

/// A card shown in the companion app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Card {
    Simple {
        title: String,
        content: String,
    },
    Standard {
        title: String,
        text: String,
        image: Image,
    },
    LinkAccount,
}

impl Card {
    /// Builds a `Standard` card when an image is given, `Simple` otherwise.
    pub fn new(title: impl Into<String>, content: impl Into<String>, image: Option<Image>) -> Self {
        match image {
            Some(image) => Self::Standard {
                title: title.into(),
                text: content.into(),
                image,
            },
            None => Self::Simple {
                title: title.into(),
                content: content.into(),
            },
        }
    }
}

/// Card image URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image_url: Option<String>,
}

/// Builder for [`ResponseEnvelope`].
///
/// ```rust,ignore
/// let envelope = ResponseBuilder::new()
///     .speech("Guess a number")
///     .reprompt("Still there?")
///     .end_session(false)
///     .build(attributes);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    /// Creates a builder for a response that ends the session.
    pub fn new() -> Self {
        Self {
            response: Response {
                should_end_session: true,
                ..Default::default()
            },
        }
    }

    /// Sets the output speech.
    pub fn speech(mut self, speech: &str) -> Self {
        self.response.output_speech = Some(OutputSpeech::ssml(speech));
        self
    }

    /// Sets the reprompt speech.
    pub fn reprompt(mut self, speech: &str) -> Self {
        self.response.reprompt = Some(Reprompt {
            output_speech: OutputSpeech::ssml(speech),
        });
        self
    }

    /// Attaches a card.
    pub fn card(mut self, card: Card) -> Self {
        self.response.card = Some(card);
        self
    }

    /// Sets whether the session ends after this response.
    pub fn end_session(mut self, end: bool) -> Self {
        self.response.should_end_session = end;
        self
    }

    /// Finishes the envelope with the given session attributes.
    pub fn build(self, session_attributes: Attributes) -> ResponseEnvelope {
        ResponseEnvelope {
            version: RESPONSE_VERSION.to_string(),
            session_attributes,
            response: self.response,
        }
    }
}
