//! Static catalog of task types.
//!
//! Every task type the editor can place on the canvas is a variant of
//! [`TaskType`]; its metadata lives in a `static` [`TaskDefinition`] chosen
//! by an exhaustive match, so adding a variant without describing it is a
//! compile error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    LaunchBrowser,
    NavigateUrl,
    PageToHtml,
    ExtractTextFromElement,
    FillInput,
    ClickElement,
    WaitForElement,
    HttpRequest,
    DeliverViaWebhook,
    ReadPropertyFromJson,
    AddPropertyToJson,
    ExtractDataWithAi,
    DatabaseQuery,
}

impl TaskType {
    pub const ALL: [TaskType; 13] = [
        TaskType::LaunchBrowser,
        TaskType::NavigateUrl,
        TaskType::PageToHtml,
        TaskType::ExtractTextFromElement,
        TaskType::FillInput,
        TaskType::ClickElement,
        TaskType::WaitForElement,
        TaskType::HttpRequest,
        TaskType::DeliverViaWebhook,
        TaskType::ReadPropertyFromJson,
        TaskType::AddPropertyToJson,
        TaskType::ExtractDataWithAi,
        TaskType::DatabaseQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::LaunchBrowser => "LAUNCH_BROWSER",
            TaskType::NavigateUrl => "NAVIGATE_URL",
            TaskType::PageToHtml => "PAGE_TO_HTML",
            TaskType::ExtractTextFromElement => "EXTRACT_TEXT_FROM_ELEMENT",
            TaskType::FillInput => "FILL_INPUT",
            TaskType::ClickElement => "CLICK_ELEMENT",
            TaskType::WaitForElement => "WAIT_FOR_ELEMENT",
            TaskType::HttpRequest => "HTTP_REQUEST",
            TaskType::DeliverViaWebhook => "DELIVER_VIA_WEBHOOK",
            TaskType::ReadPropertyFromJson => "READ_PROPERTY_FROM_JSON",
            TaskType::AddPropertyToJson => "ADD_PROPERTY_TO_JSON",
            TaskType::ExtractDataWithAi => "EXTRACT_DATA_WITH_AI",
            TaskType::DatabaseQuery => "DATABASE_QUERY",
        }
    }

    pub fn definition(&self) -> &'static TaskDefinition {
        match self {
            TaskType::LaunchBrowser => &LAUNCH_BROWSER,
            TaskType::NavigateUrl => &NAVIGATE_URL,
            TaskType::PageToHtml => &PAGE_TO_HTML,
            TaskType::ExtractTextFromElement => &EXTRACT_TEXT_FROM_ELEMENT,
            TaskType::FillInput => &FILL_INPUT,
            TaskType::ClickElement => &CLICK_ELEMENT,
            TaskType::WaitForElement => &WAIT_FOR_ELEMENT,
            TaskType::HttpRequest => &HTTP_REQUEST,
            TaskType::DeliverViaWebhook => &DELIVER_VIA_WEBHOOK,
            TaskType::ReadPropertyFromJson => &READ_PROPERTY_FROM_JSON,
            TaskType::AddPropertyToJson => &ADD_PROPERTY_TO_JSON,
            TaskType::ExtractDataWithAi => &EXTRACT_DATA_WITH_AI,
            TaskType::DatabaseQuery => &DATABASE_QUERY,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Kind of value a task parameter carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamType {
    String,
    Number,
    Json,
    BrowserInstance,
    Credential,
    Select,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutput {
    pub name: &'static str,
    pub param_type: ParamType,
}

/// Immutable metadata for one task type
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub task_type: TaskType,
    pub label: &'static str,
    pub description: &'static str,
    pub is_entry_point: bool,
    pub credits: u32,
    pub inputs: &'static [TaskInput],
    pub outputs: &'static [TaskOutput],
}

impl TaskDefinition {
    pub fn input(&self, name: &str) -> Option<&'static TaskInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&'static TaskOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

const fn input(name: &'static str, param_type: ParamType, required: bool) -> TaskInput {
    TaskInput {
        name,
        param_type,
        required,
    }
}

const fn output(name: &'static str, param_type: ParamType) -> TaskOutput {
    TaskOutput { name, param_type }
}

pub const WEB_PAGE: &str = "Web page";

static LAUNCH_BROWSER: TaskDefinition = TaskDefinition {
    task_type: TaskType::LaunchBrowser,
    label: "Open browser",
    description: "Launch a browser session and open a website",
    is_entry_point: true,
    credits: 5,
    inputs: &[input("Website Url", ParamType::String, true)],
    outputs: &[output(WEB_PAGE, ParamType::BrowserInstance)],
};

static NAVIGATE_URL: TaskDefinition = TaskDefinition {
    task_type: TaskType::NavigateUrl,
    label: "Navigate Url",
    description: "Point an open page at another URL",
    is_entry_point: false,
    credits: 2,
    inputs: &[
        input(WEB_PAGE, ParamType::BrowserInstance, true),
        input("URL", ParamType::String, true),
    ],
    outputs: &[output(WEB_PAGE, ParamType::BrowserInstance)],
};

static PAGE_TO_HTML: TaskDefinition = TaskDefinition {
    task_type: TaskType::PageToHtml,
    label: "Get html from page",
    description: "Read the current document of an open page",
    is_entry_point: false,
    credits: 2,
    inputs: &[input(WEB_PAGE, ParamType::BrowserInstance, true)],
    outputs: &[
        output("Html", ParamType::String),
        output(WEB_PAGE, ParamType::BrowserInstance),
    ],
};

static EXTRACT_TEXT_FROM_ELEMENT: TaskDefinition = TaskDefinition {
    task_type: TaskType::ExtractTextFromElement,
    label: "Extract text from element",
    description: "Select an element from html and return its text",
    is_entry_point: false,
    credits: 2,
    inputs: &[
        input("Html", ParamType::String, true),
        input("Selector", ParamType::String, true),
    ],
    outputs: &[output("Extracted text", ParamType::String)],
};

static FILL_INPUT: TaskDefinition = TaskDefinition {
    task_type: TaskType::FillInput,
    label: "Fill input",
    description: "Type a value into a form field",
    is_entry_point: false,
    credits: 1,
    inputs: &[
        input(WEB_PAGE, ParamType::BrowserInstance, true),
        input("Selector", ParamType::String, true),
        input("Value", ParamType::String, true),
    ],
    outputs: &[output(WEB_PAGE, ParamType::BrowserInstance)],
};

static CLICK_ELEMENT: TaskDefinition = TaskDefinition {
    task_type: TaskType::ClickElement,
    label: "Click Element",
    description: "Click the element matching a selector",
    is_entry_point: false,
    credits: 1,
    inputs: &[
        input(WEB_PAGE, ParamType::BrowserInstance, true),
        input("Selector", ParamType::String, true),
    ],
    outputs: &[output(WEB_PAGE, ParamType::BrowserInstance)],
};

static WAIT_FOR_ELEMENT: TaskDefinition = TaskDefinition {
    task_type: TaskType::WaitForElement,
    label: "Wait for element",
    description: "Wait until an element becomes visible or hidden",
    is_entry_point: false,
    credits: 1,
    inputs: &[
        input(WEB_PAGE, ParamType::BrowserInstance, true),
        input("Selector", ParamType::String, true),
        input("Visibility", ParamType::Select, true),
    ],
    outputs: &[output(WEB_PAGE, ParamType::BrowserInstance)],
};

static HTTP_REQUEST: TaskDefinition = TaskDefinition {
    task_type: TaskType::HttpRequest,
    label: "HTTP request",
    description: "Call an HTTP API",
    is_entry_point: true,
    credits: 2,
    inputs: &[
        input("Url", ParamType::String, true),
        input("Method", ParamType::Select, false),
        input("Body", ParamType::String, false),
        input("Credentials", ParamType::Credential, false),
    ],
    outputs: &[
        output("Status", ParamType::Number),
        output("Response body", ParamType::String),
    ],
};

static DELIVER_VIA_WEBHOOK: TaskDefinition = TaskDefinition {
    task_type: TaskType::DeliverViaWebhook,
    label: "Deliver via Webhook",
    description: "POST a body to a target URL",
    is_entry_point: false,
    credits: 1,
    inputs: &[
        input("Target URL", ParamType::String, true),
        input("Body", ParamType::String, true),
    ],
    outputs: &[],
};

static READ_PROPERTY_FROM_JSON: TaskDefinition = TaskDefinition {
    task_type: TaskType::ReadPropertyFromJson,
    label: "Read property from JSON",
    description: "Read one top-level property of a JSON document",
    is_entry_point: false,
    credits: 1,
    inputs: &[
        input("JSON", ParamType::String, true),
        input("Property name", ParamType::String, true),
    ],
    outputs: &[output("Property value", ParamType::String)],
};

static ADD_PROPERTY_TO_JSON: TaskDefinition = TaskDefinition {
    task_type: TaskType::AddPropertyToJson,
    label: "Add property to JSON",
    description: "Set one top-level property of a JSON document",
    is_entry_point: false,
    credits: 1,
    inputs: &[
        input("JSON", ParamType::String, true),
        input("Property name", ParamType::String, true),
        input("Property value", ParamType::String, true),
    ],
    outputs: &[output("Updated JSON", ParamType::String)],
};

static EXTRACT_DATA_WITH_AI: TaskDefinition = TaskDefinition {
    task_type: TaskType::ExtractDataWithAi,
    label: "Extract data with AI",
    description: "Ask a chat completion model to extract structured data",
    is_entry_point: false,
    credits: 4,
    inputs: &[
        input("Content", ParamType::String, true),
        input("Credentials", ParamType::Credential, true),
        input("Prompt", ParamType::String, true),
    ],
    outputs: &[output("Extracted data", ParamType::String)],
};

static DATABASE_QUERY: TaskDefinition = TaskDefinition {
    task_type: TaskType::DatabaseQuery,
    label: "Database query",
    description: "Run a query against a connected database",
    is_entry_point: true,
    credits: 2,
    inputs: &[
        input("Credentials", ParamType::Credential, true),
        input("Query", ParamType::String, true),
    ],
    outputs: &[output("Rows", ParamType::Json)],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_definition_matches_its_variant() {
        for task_type in TaskType::ALL {
            assert_eq!(task_type.definition().task_type, task_type);
        }
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("PAGE_TO_HTML".parse::<TaskType>(), Ok(TaskType::PageToHtml));
        assert!("SEND_FAX".parse::<TaskType>().is_err());
        let json = serde_json::to_string(&TaskType::ExtractDataWithAi).unwrap();
        assert_eq!(json, "\"EXTRACT_DATA_WITH_AI\"");
    }

    #[test]
    fn browser_inputs_are_required() {
        for task_type in TaskType::ALL {
            for input in task_type.definition().inputs {
                if input.param_type == ParamType::BrowserInstance {
                    assert!(input.required, "{} {}", task_type, input.name);
                }
            }
        }
    }
}
