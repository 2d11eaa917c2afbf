use std::path::PathBuf;

const URI_SCHEME: &str = "vision-lab://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Create,
    Edit,
    Analyze,
    TimeTravel,
}

impl Mode {
    pub const ALL: &'static [Mode] = &[Mode::Create, Mode::Edit, Mode::Analyze, Mode::TimeTravel];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Create => "Creator",
            Mode::Edit => "Image Editor",
            Mode::Analyze => "Image Analyzer",
            Mode::TimeTravel => "Time-Travel Booth",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" | "creator" | "generate" => Ok(Mode::Create),
            "edit" | "editor" => Ok(Mode::Edit),
            "analyze" | "analyse" | "analyzer" => Ok(Mode::Analyze),
            "time-travel" | "timetravel" | "time_travel" => Ok(Mode::TimeTravel),
            other => Err(format!(
                "Unknown mode '{other}'. Use create, edit, analyze or time-travel."
            )),
        }
    }
}

/// Initial state requested on the command line or through a `vision-lab://`
/// link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchRequest {
    pub mode: Option<Mode>,
    pub image: Option<PathBuf>,
    pub prompt: Option<String>,
}

pub fn parse_launch_request_from_args(args: &[String]) -> Result<Option<LaunchRequest>, String> {
    if args.is_empty() {
        return Ok(None);
    }

    if args.len() == 1 && is_vision_lab_uri(&args[0]) {
        return parse_vision_lab_uri(&args[0]).map(Some);
    }

    let mut request = LaunchRequest::default();
    let mut index = 0usize;
    while index < args.len() {
        let arg = args[index].as_str();
        match arg {
            "--mode" | "--image" | "--prompt" => {
                let Some(value) = args.get(index + 1) else {
                    return Err(format!("Missing value after {arg}."));
                };
                match arg {
                    "--mode" => request.mode = Some(Mode::parse(value)?),
                    "--image" => request.image = Some(PathBuf::from(value)),
                    _ => request.prompt = Some(value.clone()),
                }
                index += 2;
            }
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown option {flag}."));
            }
            path => {
                if request.image.is_some() {
                    return Err("Only one image can be opened at launch.".to_string());
                }
                request.image = Some(PathBuf::from(path));
                index += 1;
            }
        }
    }

    Ok(Some(request))
}

pub fn parse_vision_lab_uri(uri: &str) -> Result<LaunchRequest, String> {
    let rest = strip_vision_lab_scheme(uri)
        .ok_or_else(|| format!("URL must start with {URI_SCHEME}"))?;

    let (location, query) = split_location_and_query(rest);
    let location = location.trim().trim_end_matches('/');
    if !location.is_empty() && !location.eq_ignore_ascii_case("open") {
        return Err(format!("Unsupported {URI_SCHEME} action '{location}'."));
    }

    let mut request = LaunchRequest::default();
    if let Some(query_string) = query {
        for pair in query_string.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = key.trim().to_ascii_lowercase();
            let decoded_value = percent_decode(value)?;
            match key.as_str() {
                "mode" => request.mode = Some(Mode::parse(&decoded_value)?),
                "image" | "path" | "file" => {
                    if !decoded_value.trim().is_empty() {
                        request.image = Some(PathBuf::from(decoded_value.trim()));
                    }
                }
                "prompt" => {
                    if !decoded_value.trim().is_empty() {
                        request.prompt = Some(decoded_value);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(request)
}

fn is_vision_lab_uri(value: &str) -> bool {
    strip_vision_lab_scheme(value).is_some()
}

fn strip_vision_lab_scheme(uri: &str) -> Option<&str> {
    uri.get(..URI_SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(URI_SCHEME))
        .then(|| &uri[URI_SCHEME.len()..])
}

fn split_location_and_query(value: &str) -> (&str, Option<&str>) {
    if let Some((location, query)) = value.split_once('?') {
        (location, Some(query))
    } else {
        (value, None)
    }
}

fn percent_decode(value: &str) -> Result<String, String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' => {
                if index + 2 >= bytes.len() {
                    return Err("Invalid percent-encoding in URL.".to_string());
                }
                let hi = decode_hex_digit(bytes[index + 1])
                    .ok_or_else(|| "Invalid percent-encoding in URL.".to_string())?;
                let lo = decode_hex_digit(bytes[index + 2])
                    .ok_or_else(|| "Invalid percent-encoding in URL.".to_string())?;
                decoded.push((hi << 4) | lo);
                index += 3;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }

    String::from_utf8(decoded).map_err(|_| "URL contains invalid UTF-8 after decoding.".to_string())
}

fn decode_hex_digit(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}
