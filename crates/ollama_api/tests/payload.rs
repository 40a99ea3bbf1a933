use serde_json::json;

use ollama_api::{ChatMessage, ChatRequest, ChatResponse, TagsResponse, ToolSpec};

#[test]
fn chat_request_serializes_non_streaming_with_tools() {
    let tool = ToolSpec::function(
        "run_script",
        "Execute a script",
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string" },
                "description": { "type": "string" }
            },
            "required": ["code", "description"]
        }),
    );
    let request = ChatRequest::new(
        "qwen3-coder:30b",
        vec![
            ChatMessage::system("instructions"),
            ChatMessage::user("count the files here"),
        ],
        vec![tool],
    );

    let value = serde_json::to_value(&request).expect("request serializes");

    assert_eq!(value["model"], "qwen3-coder:30b");
    assert_eq!(value["stream"], false);
    assert_eq!(value["options"]["temperature"], 0.0);
    assert_eq!(value["messages"][0]["role"], "system");
    assert_eq!(value["messages"][1]["content"], "count the files here");
    assert_eq!(value["tools"][0]["type"], "function");
    assert_eq!(value["tools"][0]["function"]["name"], "run_script");
    assert_eq!(
        value["tools"][0]["function"]["parameters"]["required"],
        json!(["code", "description"])
    );
}

#[test]
fn plain_messages_omit_the_tool_calls_field() {
    let value = serde_json::to_value(ChatMessage::user("hello")).expect("message serializes");

    assert!(value.get("tool_calls").is_none());
}

#[test]
fn tool_result_messages_use_the_tool_role() {
    let value =
        serde_json::to_value(ChatMessage::tool("[5]")).expect("tool message serializes");

    assert_eq!(value["role"], "tool");
    assert_eq!(value["content"], "[5]");
}

#[test]
fn chat_response_decodes_tool_calls_and_token_counts() {
    let body = json!({
        "model": "qwen3-coder:30b",
        "message": {
            "role": "assistant",
            "content": "",
            "tool_calls": [
                {
                    "function": {
                        "name": "run_script",
                        "arguments": { "code": "capture(1 + 1)", "description": "Adding" }
                    }
                }
            ]
        },
        "done": true,
        "prompt_eval_count": 120,
        "eval_count": 34
    })
    .to_string();

    let response: ChatResponse = serde_json::from_str(&body).expect("response decodes");

    assert!(response.done);
    assert_eq!(response.prompt_eval_count, 120);
    assert_eq!(response.eval_count, 34);
    assert_eq!(response.message.tool_calls().len(), 1);
    assert_eq!(response.message.tool_calls()[0].function.name, "run_script");
}

#[test]
fn chat_response_token_counts_default_to_zero_when_absent() {
    let body = json!({
        "message": { "role": "assistant", "content": "All done." },
        "done": true
    })
    .to_string();

    let response: ChatResponse = serde_json::from_str(&body).expect("response decodes");

    assert_eq!(response.prompt_eval_count, 0);
    assert_eq!(response.eval_count, 0);
    assert!(response.message.tool_calls().is_empty());
}

#[test]
fn tags_response_decodes_model_names() {
    let body = json!({
        "models": [
            { "name": "qwen3-coder:30b", "size": 18556442675u64 },
            { "name": "llama3.2:latest", "size": 2019393189u64 }
        ]
    })
    .to_string();

    let tags: TagsResponse = serde_json::from_str(&body).expect("tags decode");
    let names: Vec<_> = tags.models.into_iter().map(|model| model.name).collect();

    assert_eq!(names, vec!["qwen3-coder:30b", "llama3.2:latest"]);
}

#[test]
fn assistant_tool_call_replay_keeps_empty_content() {
    let calls = vec![ollama_api::ToolCall {
        function: ollama_api::FunctionCall {
            name: "run_script".to_string(),
            arguments: json!({ "code": "capture(2)", "description": "Capture two" }),
        },
    }];

    let value = serde_json::to_value(ChatMessage::assistant_tool_calls(calls))
        .expect("message serializes");

    assert_eq!(value["role"], "assistant");
    assert_eq!(value["content"], "");
    assert_eq!(value["tool_calls"][0]["function"]["name"], "run_script");
}
