//! Constructors for the `ProcessingResponse` directives the stream handler emits.

use crate::pb::{
    BodyMutation, BodyResponse, CommonResponse, CommonResponseStatus, HeaderMutation,
    HeaderValue, HeadersResponse, ImmediateResponse, ProcessingResponse,
    processing_response::Response,
};

fn continue_status() -> CommonResponse {
    CommonResponse {
        status: CommonResponseStatus::Continue as i32,
        header_mutation: None,
        body_mutation: None,
    }
}

pub fn request_headers_continue() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(Response::RequestHeaders(HeadersResponse {
            response: Some(continue_status()),
        })),
    }
}

pub fn response_headers_continue() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(Response::ResponseHeaders(HeadersResponse {
            response: Some(continue_status()),
        })),
    }
}

pub fn response_body_continue() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(Response::ResponseBody(BodyResponse {
            response: Some(continue_status()),
        })),
    }
}

/// A `RequestBody` directive with no mutation (model was not changed by routing).
pub fn request_body_continue() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(Response::RequestBody(BodyResponse {
            response: Some(continue_status()),
        })),
    }
}

/// A `RequestBody` directive that replaces the body and drops `content-length`, since its value
/// is no longer valid once the body has been rewritten.
pub fn request_body_mutated(new_body: Vec<u8>) -> ProcessingResponse {
    ProcessingResponse {
        response: Some(Response::RequestBody(BodyResponse {
            response: Some(CommonResponse {
                status: CommonResponseStatus::Continue as i32,
                header_mutation: Some(HeaderMutation {
                    set_headers: vec![],
                    remove_headers: vec!["content-length".to_string()],
                }),
                body_mutation: Some(BodyMutation {
                    mutation: Some(crate::pb::body_mutation::Mutation::Body(new_body)),
                }),
            }),
        })),
    }
}

/// Short-circuits the transaction with a synthetic HTTP response built from a cached body.
pub fn immediate_cache_hit(body: Vec<u8>) -> ProcessingResponse {
    ProcessingResponse {
        response: Some(Response::ImmediateResponse(ImmediateResponse {
            status_code: 200,
            headers: Some(HeaderMutation {
                set_headers: vec![
                    HeaderValue {
                        key: "content-type".to_string(),
                        value: "application/json".to_string(),
                    },
                    HeaderValue {
                        key: "x-cache-hit".to_string(),
                        value: "true".to_string(),
                    },
                ],
                remove_headers: vec![],
            }),
            body,
            details: "semantic cache hit".to_string(),
        })),
    }
}
