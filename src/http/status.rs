#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NonAuthoritativeInformation = 203,
    NoContent = 204,
    ResetContent = 205,
    PartialContent = 206,

    MultipleChoices = 300,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    BadRequest = 400,
    PaymentRequired = 402,
    Forbidden = 403,
    NotFound = 404,

    InternalServerError = 500,
}

impl HttpStatus {
    pub fn from_code(code: u16) -> Option<HttpStatus> {
        use HttpStatus::*;
        let status = match code {
            200 => Ok,
            201 => Created,
            202 => Accepted,
            203 => NonAuthoritativeInformation,
            204 => NoContent,
            205 => ResetContent,
            206 => PartialContent,
            300 => MultipleChoices,
            301 => MovedPermanently,
            302 => Found,
            303 => SeeOther,
            304 => NotModified,
            307 => TemporaryRedirect,
            308 => PermanentRedirect,
            400 => BadRequest,
            402 => PaymentRequired,
            403 => Forbidden,
            404 => NotFound,
            500 => InternalServerError,
            _ => return None,
        };
        Some(status)
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn reason(self) -> &'static str {
        use HttpStatus::*;
        match self {
            Ok => "OK",
            Created => "Created",
            Accepted => "Accepted",
            NonAuthoritativeInformation => "Non-Authoritative Information",
            NoContent => "No Content",
            ResetContent => "Reset Content",
            PartialContent => "Partial Content",
            MultipleChoices => "Multiple Choices",
            MovedPermanently => "Moved Permanently",
            Found => "Found",
            SeeOther => "See Other",
            NotModified => "Not Modified",
            TemporaryRedirect => "Temporary Redirect",
            PermanentRedirect => "Permanent Redirect",
            BadRequest => "Bad Request",
            PaymentRequired => "Payment Required",
            Forbidden => "Forbidden",
            NotFound => "Not Found",
            InternalServerError => "Internal Server Error",
        }
    }
}

/// Reason phrase for a status line; `Unknown` for codes outside the table.
pub fn reason(code: u16) -> &'static str {
    HttpStatus::from_code(code).map_or("Unknown", HttpStatus::reason)
}
