//! Marble diagram parser.
//!
//! Two entry points:
//! - [`DiagramParser::parse`] turns an event diagram into a [`Timeline`]
//! - [`DiagramParser::parse_subscription`] reads a subscription diagram
//!   (only `-`, space, `(`, `)`, `^`, `!`)
//!
//! Frames are `column * frame_time_factor`. For diagrams containing `^`,
//! columns are counted from the `^`, so history before it lands at negative
//! frames.

use super::{Frame, MarkerValue, Notification, SimulatedError, Timeline, ValueMap};

/// Result of parsing an event diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiagram<T> {
    /// Events, relative to the `^` column if there is one.
    pub timeline: Timeline<T>,
    /// Column of the `^` marker (the opening parenthesis if grouped).
    pub subscription_column: Option<usize>,
    /// Frame of the `!` marker, on the same axis as the timeline.
    pub unsubscription_frame: Option<Frame>,
}

/// Subscribe/unsubscribe points read from a subscription diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionMarkers {
    pub subscribed_at: Option<Frame>,
    pub unsubscribed_at: Option<Frame>,
}

/// A malformed diagram. Every variant carries the column it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `(` without `)`, or `)` without `(`.
    UnbalancedGroup { column: usize },
    /// `(` inside an open group.
    NestedGroup { column: usize },
    /// A second `|` or `#`.
    MultipleTerminals { column: usize },
    /// A value marker after `|` or `#`.
    EventAfterTerminal { column: usize },
    /// A second `^`.
    DuplicateSubscriptionMarker { column: usize },
    /// A second `!`.
    DuplicateUnsubscriptionMarker { column: usize },
    /// `^` in a cold source; cold sources have no history before subscription.
    SubscriptionMarkerInCold { column: usize },
    /// `!` in a source diagram; only subscription diagrams carry it.
    UnsubscriptionMarkerInSource,
    /// A subscription diagram without `^`.
    MissingSubscriptionMarker,
    /// Anything other than `-`, space, `(`, `)`, `^`, `!` in a subscription diagram.
    UnexpectedSubscriptionCharacter { character: char, column: usize },
    /// A marker with no entry in the value map and no default value.
    UnmappedMarker { marker: char, column: usize },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnbalancedGroup { column } => {
                write!(f, "unbalanced group at column {column}")
            }
            Self::NestedGroup { column } => {
                write!(f, "nested group at column {column}")
            }
            Self::MultipleTerminals { column } => {
                write!(f, "second terminal marker at column {column}")
            }
            Self::EventAfterTerminal { column } => {
                write!(f, "event after terminal marker at column {column}")
            }
            Self::DuplicateSubscriptionMarker { column } => {
                write!(f, "second '^' at column {column}")
            }
            Self::DuplicateUnsubscriptionMarker { column } => {
                write!(f, "second '!' at column {column}")
            }
            Self::SubscriptionMarkerInCold { column } => {
                write!(f, "cold diagram cannot have '^' (found at column {column})")
            }
            Self::UnsubscriptionMarkerInSource => {
                write!(f, "source diagrams cannot have the unsubscription marker '!'")
            }
            Self::MissingSubscriptionMarker => {
                write!(f, "subscription diagram has no '^'")
            }
            Self::UnexpectedSubscriptionCharacter { character, column } => write!(
                f,
                "subscription diagrams only allow '^' and '!' markers, found '{character}' at column {column}"
            ),
            Self::UnmappedMarker { marker, column } => {
                write!(f, "no value for marker '{marker}' at column {column}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Group tracking shared by both diagram kinds.
#[derive(Debug, Default)]
struct GroupState {
    /// Column of the currently open `(`.
    open: Option<usize>,
    /// Column of the `(` of a group closed by the previous character.
    just_closed: Option<usize>,
}

impl GroupState {
    /// Handle a structural character. Returns `Ok(true)` if it was one.
    fn step(&mut self, column: usize, c: char) -> Result<bool, ParseError> {
        let previous_close = self.just_closed.take();
        match c {
            '(' => {
                if self.open.is_some() {
                    return Err(ParseError::NestedGroup { column });
                }
                self.open = Some(column);
                Ok(true)
            }
            ')' => {
                let start = self
                    .open
                    .take()
                    .ok_or(ParseError::UnbalancedGroup { column })?;
                self.just_closed = Some(start);
                Ok(true)
            }
            _ => {
                self.just_closed = previous_close;
                Ok(false)
            }
        }
    }

    /// Column an event at `column` belongs to.
    fn event_column(&self, column: usize) -> usize {
        self.open.unwrap_or(column)
    }

    /// Column for `!`: a group's column when inside it or directly after it.
    fn unsubscription_column(&self, column: usize) -> usize {
        self.open.or(self.just_closed).unwrap_or(column)
    }

    /// Called once per character after dispatch; forgets a closed group
    /// once another character has been seen.
    fn settle(&mut self, c: char) {
        if c != ')' {
            self.just_closed = None;
        }
    }

    fn finish(&self) -> Result<(), ParseError> {
        match self.open {
            Some(column) => Err(ParseError::UnbalancedGroup { column }),
            None => Ok(()),
        }
    }
}

/// Parser configured with a frame time factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagramParser {
    frame_time_factor: u32,
}

impl DiagramParser {
    /// Create a parser. A factor of zero is treated as one.
    #[must_use]
    pub const fn new(frame_time_factor: u32) -> Self {
        Self {
            frame_time_factor: if frame_time_factor == 0 {
                1
            } else {
                frame_time_factor
            },
        }
    }

    #[must_use]
    pub const fn frame_time_factor(&self) -> u32 {
        self.frame_time_factor
    }

    fn frame_at(&self, column: usize, origin: usize) -> Frame {
        let column = Frame::try_from(column).unwrap_or(Frame::MAX);
        let origin = Frame::try_from(origin).unwrap_or(Frame::MAX);
        (column - origin).saturating_mul(Frame::from(self.frame_time_factor))
    }

    /// Parse an event diagram.
    ///
    /// `values` maps markers to values; unmapped markers fall back to
    /// [`MarkerValue::from_marker`]. `error` is the payload for `#`, the
    /// generic error if `None`.
    pub fn parse<T: Clone + MarkerValue>(
        &self,
        diagram: &str,
        values: Option<&ValueMap<T>>,
        error: Option<&SimulatedError>,
    ) -> Result<ParsedDiagram<T>, ParseError> {
        let mut group = GroupState::default();
        let mut subscription_column = None;
        let mut unsubscription_column = None;
        let mut terminated = false;
        let mut events: Vec<(usize, Notification<T>)> = Vec::new();

        for (column, c) in diagram.chars().enumerate() {
            if group.step(column, c)? {
                group.settle(c);
                continue;
            }

            let notification = match c {
                '-' | ' ' => None,
                '^' => {
                    if subscription_column.is_some() {
                        return Err(ParseError::DuplicateSubscriptionMarker { column });
                    }
                    subscription_column = Some(group.event_column(column));
                    None
                }
                '!' => {
                    if unsubscription_column.is_some() {
                        return Err(ParseError::DuplicateUnsubscriptionMarker { column });
                    }
                    unsubscription_column = Some(group.unsubscription_column(column));
                    None
                }
                '|' | '#' => {
                    if terminated {
                        return Err(ParseError::MultipleTerminals { column });
                    }
                    terminated = true;
                    Some(if c == '|' {
                        Notification::Complete
                    } else {
                        Notification::Error(error.cloned().unwrap_or_default())
                    })
                }
                marker => {
                    if terminated {
                        return Err(ParseError::EventAfterTerminal { column });
                    }
                    let value = match values {
                        Some(values) => values.resolve(marker),
                        None => T::from_marker(marker),
                    }
                    .ok_or(ParseError::UnmappedMarker { marker, column })?;
                    Some(Notification::Next(value))
                }
            };

            if let Some(notification) = notification {
                events.push((group.event_column(column), notification));
            }
            group.settle(c);
        }
        group.finish()?;

        let origin = subscription_column.unwrap_or(0);
        let mut timeline = Timeline::new();
        for (column, notification) in events {
            timeline.push(self.frame_at(column, origin), notification);
        }

        Ok(ParsedDiagram {
            timeline,
            subscription_column,
            unsubscription_frame: unsubscription_column.map(|column| self.frame_at(column, origin)),
        })
    }

    /// Parse a subscription diagram such as `"--^---!"` or `"(^!)"`.
    ///
    /// Frames are absolute: column 0 is frame 0.
    pub fn parse_subscription(&self, diagram: &str) -> Result<SubscriptionMarkers, ParseError> {
        let mut group = GroupState::default();
        let mut markers = SubscriptionMarkers {
            subscribed_at: None,
            unsubscribed_at: None,
        };

        for (column, c) in diagram.chars().enumerate() {
            if group.step(column, c)? {
                group.settle(c);
                continue;
            }
            match c {
                '-' | ' ' => {}
                '^' => {
                    if markers.subscribed_at.is_some() {
                        return Err(ParseError::DuplicateSubscriptionMarker { column });
                    }
                    markers.subscribed_at = Some(self.frame_at(group.event_column(column), 0));
                }
                '!' => {
                    if markers.unsubscribed_at.is_some() {
                        return Err(ParseError::DuplicateUnsubscriptionMarker { column });
                    }
                    markers.unsubscribed_at =
                        Some(self.frame_at(group.unsubscription_column(column), 0));
                }
                character => {
                    return Err(ParseError::UnexpectedSubscriptionCharacter { character, column });
                }
            }
            group.settle(c);
        }
        group.finish()?;

        Ok(markers)
    }
}

impl Default for DiagramParser {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Parse an event diagram with one frame per column.
pub fn parse<T: Clone + MarkerValue>(
    diagram: &str,
    values: Option<&ValueMap<T>>,
) -> Result<ParsedDiagram<T>, ParseError> {
    DiagramParser::default().parse(diagram, values, None)
}
