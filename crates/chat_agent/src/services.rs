use std::sync::Arc;

use agent_service::AgentService;
use agent_service_mock::{MockAgentService, MOCK_SERVICE_ID};

pub fn service_for_id(service_id: &str) -> Result<Arc<dyn AgentService>, String> {
    match service_id {
        MOCK_SERVICE_ID => Ok(Arc::new(MockAgentService::default())),
        unknown => Err(format!(
            "Unsupported agent service '{unknown}'. Available services: {MOCK_SERVICE_ID}"
        )),
    }
}
