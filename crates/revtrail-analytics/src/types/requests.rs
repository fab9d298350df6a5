use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use super::analytics::AnalyticsError;

macro_rules! dimension {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AnalyticsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($label => Ok($name::$variant),)+
                    other => Err(AnalyticsError::InvalidInput(format!(
                        "unknown {} dimension: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

dimension!(
    /// Page-level grouping. Entry and exit count sessions by their first
    /// and last page view.
    PathDimension {
        Page => "page",
        Hostname => "hostname",
        Entry => "entry",
        Exit => "exit",
    }
);

dimension!(LocationDimension {
    Country => "country",
    Region => "region",
    City => "city",
});

dimension!(SystemDimension {
    Browser => "browser",
    Os => "os",
    Device => "device",
});

dimension!(
    /// Traffic source grouping over page views
    SourceDimension {
        Referrer => "referrer",
        Campaign => "campaign",
        Keyword => "keyword",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!("Entry".parse::<PathDimension>().unwrap(), PathDimension::Entry);
        assert_eq!(" os ".parse::<SystemDimension>().unwrap(), SystemDimension::Os);
        assert_eq!(LocationDimension::City.to_string(), "city");
        assert!(matches!(
            "planet".parse::<LocationDimension>(),
            Err(AnalyticsError::InvalidInput(_))
        ));
        assert_eq!(SourceDimension::ALL.len(), 3);
    }
}
