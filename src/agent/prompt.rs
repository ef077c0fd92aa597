//! Prompt templates for the reasoning engine.

use std::sync::Arc;

use crate::tools::Tool;

use super::scratchpad::Scratchpad;

/// A worked example and the tools it calls.
struct WorkedExample {
    tools: &'static [&'static str],
    text: &'static str,
}

/// Examples only reach the prompt when every tool they call is available, so
/// the engine is never shown a call it cannot make.
const EXAMPLE_BANK: &[WorkedExample] = &[
    WorkedExample {
        tools: &[],
        text: "Question: What does EPS stand for?
Thought: This is general financial vocabulary and needs no tool.
Final Answer: EPS stands for earnings per share.",
    },
    WorkedExample {
        tools: &["sql_database_query"],
        text: "Question: What was our total profit in 2023?
Thought: Quarterly profits are in the internal database, so I should sum them for 2023.
Action: sql_database_query
Action Input: SELECT SUM(profit_millions) FROM quarterly_financials WHERE year = 2023
Observation: [(105000,)]
Thought: I now know the final answer.
Final Answer: Total profit for 2023 was $105,000 million.",
    },
    WorkedExample {
        tools: &["web_search"],
        text: "Question: How has Alphabet stock moved this week?
Thought: This needs current market data, so I should search the web.
Action: web_search
Action Input: Alphabet GOOGL stock price this week
Observation: Alphabet shares rose 3% after strong cloud revenue guidance.
URL: https://news.example.com/alphabet
Thought: I now know the final answer.
Final Answer: Alphabet stock rose about 3% this week on strong cloud guidance.",
    },
    WorkedExample {
        tools: &["query_10k_report"],
        text: "Question: What regulatory risks did Google report for 2023?
Thought: Risk factors are described in the annual report.
Action: query_10k_report
Action Input: What regulatory and legal risks does Google describe?
Observation: The report cites antitrust investigations, privacy regulation and content liability rules.
Thought: I now know the final answer.
Final Answer: Google highlighted antitrust scrutiny, privacy regulation and content liability as key regulatory risks.",
    },
    WorkedExample {
        tools: &["sql_database_query", "query_10k_report"],
        text: "Question: Which quarter of 2023 had our highest revenue, and what growth drivers did Google report?
Thought: I need internal revenue by quarter first.
Action: sql_database_query
Action Input: SELECT quarter, revenue_millions FROM quarterly_financials WHERE year = 2023 ORDER BY revenue_millions DESC LIMIT 1
Observation: [('Q4', 95000)]
Thought: Now I need Google's growth drivers from the annual report.
Action: query_10k_report
Action Input: What were Google's main revenue growth drivers in 2023?
Observation: Growth was driven by Search advertising, YouTube and Google Cloud.
Thought: I now know the final answer.
Final Answer: Our highest 2023 revenue was Q4 at $95,000 million. Google attributed its 2023 growth to Search advertising, YouTube and Google Cloud.",
    },
];

/// Build the full prompt for one reasoning call.
pub fn build_prompt(question: &str, scratchpad: &Scratchpad, tools: &[Arc<dyn Tool>]) -> String {
    let tool_catalog = if tools.is_empty() {
        "(no tools are available; answer directly)".to_string()
    } else {
        tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let tool_names = tools
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ");

    let examples = select_examples(tools)
        .map(|e| e.text)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are a financial analyst agent. Answer the question as accurately as you can. Reason step by step and use the tools below whenever you need data you do not already have.

You have access to the following tools:

{tool_catalog}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, must be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Every response must contain one Thought followed by either exactly one Action and Action Input pair, or exactly one Final Answer. Never write both, and never write the Observation yourself.

Examples:

{examples}

Begin!

Question: {question}
{scratchpad}Thought:"#,
        scratchpad = scratchpad.render(),
    )
}

fn select_examples<'a>(tools: &'a [Arc<dyn Tool>]) -> impl Iterator<Item = &'static WorkedExample> + 'a {
    EXAMPLE_BANK.iter().filter(move |example| {
        example
            .tools
            .iter()
            .all(|needed| tools.iter().any(|t| t.name() == *needed))
    })
}
