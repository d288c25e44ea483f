//! Built-in benchmark processes deployed before every step

use serde_json::json;

use crate::definition::{Activity, Branch, Completion, ProcessDefinition};

pub const START_TO_END: &str = "startToEnd";
pub const ALL_SEQUENTIAL_SERVICE_TASKS: &str = "allSequentialServiceTasks";
pub const PARALLEL_SUBPROCESSES: &str = "parallelSubprocesses";
pub const MANY_VARIABLES: &str = "manyVariables";
pub const TERMINATE_USER_TASKS: &str = "terminateUserTasks";

/// Number of service tasks in `allSequentialServiceTasks`
pub const SEQUENTIAL_SERVICE_TASKS: usize = 10;

/// Task names created by `parallelSubprocesses`, one per subprocess
pub const PARALLEL_TASKS: [&str; 3] = ["A", "B", "C"];

/// Task names created by `terminateUserTasks`; completing `A` ends the instance
pub const TERMINATE_TASKS: [&str; 3] = ["A", "B", "C"];

/// All built-in process definitions
pub fn builtin() -> Vec<ProcessDefinition> {
    vec![
        start_to_end(),
        all_sequential_service_tasks(),
        parallel_subprocesses(),
        many_variables(),
        terminate_user_tasks(),
    ]
}

fn start_to_end() -> ProcessDefinition {
    ProcessDefinition::new(START_TO_END, "Start to end", Vec::new())
}

fn all_sequential_service_tasks() -> ProcessDefinition {
    let activities = (1..=SEQUENTIAL_SERVICE_TASKS)
        .map(|i| Activity::Service {
            name: format!("serviceTask{}", i),
        })
        .collect();
    ProcessDefinition::new(
        ALL_SEQUENTIAL_SERVICE_TASKS,
        "All sequential service tasks",
        activities,
    )
}

fn parallel_subprocesses() -> ProcessDefinition {
    ProcessDefinition::new(
        PARALLEL_SUBPROCESSES,
        "Parallel subprocesses",
        vec![Activity::UserTasks {
            names: names(&PARALLEL_TASKS),
            completion: Completion::All,
        }],
    )
}

fn many_variables() -> ProcessDefinition {
    let task = |name: &str| Activity::UserTasks {
        names: vec![name.to_string()],
        completion: Completion::All,
    };

    let second = Activity::Choice {
        variable: "secondGw".to_string(),
        branches: vec![
            Branch {
                when: Some(json!("A")),
                activities: vec![task("A")],
            },
            Branch {
                when: None,
                activities: vec![task("B")],
            },
        ],
    };

    ProcessDefinition::new(
        MANY_VARIABLES,
        "Many variables",
        vec![Activity::Choice {
            variable: "firstGw".to_string(),
            branches: vec![
                Branch {
                    when: Some(json!("A")),
                    activities: vec![second],
                },
                Branch {
                    when: None,
                    activities: vec![task("C")],
                },
            ],
        }],
    )
}

fn terminate_user_tasks() -> ProcessDefinition {
    ProcessDefinition::new(
        TERMINATE_USER_TASKS,
        "Terminate user tasks",
        vec![Activity::UserTasks {
            names: names(&TERMINATE_TASKS),
            completion: Completion::Terminate {
                trigger: "A".to_string(),
            },
        }],
    )
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
