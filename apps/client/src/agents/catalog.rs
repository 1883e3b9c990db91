use super::types::{AgentDescriptor, Phase};

/// Number of agents in the roster
pub const AGENT_COUNT: usize = 88;

const fn agent(
    id: &'static str,
    display_name: &'static str,
    phase: Phase,
    specialization: &'static str,
) -> AgentDescriptor {
    AgentDescriptor {
        id,
        display_name,
        phase,
        specialization,
    }
}

/// The fixed roster, grouped by phase in pipeline order
#[rustfmt::skip]
static ROSTER: [AgentDescriptor; AGENT_COUNT] = [
    // Analysis
    agent("agent_001", "Business Model Analyzer", Phase::Analysis, "Business strategy and revenue models"),
    agent("agent_002", "Target Audience Researcher", Phase::Analysis, "User personas and demographics"),
    agent("agent_003", "Competitor Analysis Specialist", Phase::Analysis, "Market positioning and competitive landscape"),
    agent("agent_004", "Brand Identity Extractor", Phase::Analysis, "Brand voice and visual identity"),
    agent("agent_005", "Content Strategy Planner", Phase::Analysis, "Content architecture and messaging"),
    agent("agent_006", "User Journey Mapper", Phase::Analysis, "Customer experience pathways"),
    agent("agent_007", "Value Proposition Designer", Phase::Analysis, "Core value and differentiation"),
    agent("agent_008", "Market Trends Analyst", Phase::Analysis, "Industry trends and opportunities"),
    agent("agent_009", "Pain Point Identifier", Phase::Analysis, "Customer problems and solutions"),
    agent("agent_010", "Feature Prioritizer", Phase::Analysis, "Feature importance and roadmap"),
    agent("agent_011", "Conversion Goal Setter", Phase::Analysis, "KPI definition and optimization"),
    agent("agent_012", "Technical Requirements Analyzer", Phase::Analysis, "Platform and integration needs"),
    agent("agent_013", "SEO Strategy Consultant", Phase::Analysis, "Search optimization planning"),
    agent("agent_014", "Mobile Strategy Planner", Phase::Analysis, "Mobile-first considerations"),
    agent("agent_015", "Performance Requirements Analyst", Phase::Analysis, "Speed and scalability needs"),
    agent("agent_016", "Security Assessment Specialist", Phase::Analysis, "Security requirements and compliance"),
    agent("agent_017", "Analytics Requirements Planner", Phase::Analysis, "Tracking and measurement setup"),
    agent("agent_018", "Accessibility Consultant", Phase::Analysis, "WCAG compliance and inclusion"),
    agent("agent_019", "Integration Requirements Analyst", Phase::Analysis, "Third-party service planning"),
    agent("agent_020", "Content Management Strategist", Phase::Analysis, "CMS and content workflow needs"),
    agent("agent_021", "User Testing Planner", Phase::Analysis, "Testing strategy and validation"),
    agent("agent_022", "Growth Strategy Consultant", Phase::Analysis, "Scalability and expansion planning"),

    // Design
    agent("agent_023", "Color Palette Generator", Phase::Design, "Brand colors and psychology"),
    agent("agent_024", "Typography Curator", Phase::Design, "Font selection and hierarchy"),
    agent("agent_025", "Layout Architect", Phase::Design, "Grid systems and spatial design"),
    agent("agent_026", "UI Component Designer", Phase::Design, "Interface elements and patterns"),
    agent("agent_027", "Brand Consistency Checker", Phase::Design, "Visual identity alignment"),
    agent("agent_028", "Visual Hierarchy Specialist", Phase::Design, "Information architecture design"),
    agent("agent_029", "Icon Library Curator", Phase::Design, "Icon system and visual language"),
    agent("agent_030", "Responsive Design Engineer", Phase::Design, "Multi-device layout adaptation"),
    agent("agent_031", "Animation Director", Phase::Design, "Micro-interactions and motion"),
    agent("agent_032", "Image Style Coordinator", Phase::Design, "Photography and imagery curation"),
    agent("agent_033", "Whitespace Optimizer", Phase::Design, "Spacing and breathing room"),
    agent("agent_034", "Visual Flow Designer", Phase::Design, "User journey visualization"),
    agent("agent_035", "Accessibility Design Consultant", Phase::Design, "Inclusive design patterns"),
    agent("agent_036", "Mobile UI Specialist", Phase::Design, "Touch-first interface design"),
    agent("agent_037", "Dark Mode Designer", Phase::Design, "Theme variations and adaptability"),
    agent("agent_038", "Loading State Designer", Phase::Design, "Progressive enhancement visuals"),
    agent("agent_039", "Error State Designer", Phase::Design, "Error handling and messaging"),
    agent("agent_040", "Form Design Specialist", Phase::Design, "Input patterns and validation"),
    agent("agent_041", "Navigation Designer", Phase::Design, "Menu systems and wayfinding"),
    agent("agent_042", "CTA Optimization Expert", Phase::Design, "Call-to-action design and placement"),
    agent("agent_043", "Visual Storytelling Designer", Phase::Design, "Narrative flow and engagement"),
    agent("agent_044", "Brand Asset Creator", Phase::Design, "Logo adaptation and brand elements"),

    // Frontend
    agent("agent_045", "React Component Architect", Phase::Frontend, "Component structure and patterns"),
    agent("agent_046", "CSS Framework Engineer", Phase::Frontend, "Styling architecture and optimization"),
    agent("agent_047", "Animation Implementation Specialist", Phase::Frontend, "CSS and JavaScript animations"),
    agent("agent_048", "Responsive Code Engineer", Phase::Frontend, "Breakpoint management and flexibility"),
    agent("agent_049", "Performance Optimization Expert", Phase::Frontend, "Bundle size and load time optimization"),
    agent("agent_050", "Accessibility Implementation Engineer", Phase::Frontend, "ARIA patterns and keyboard navigation"),
    agent("agent_051", "SEO Implementation Specialist", Phase::Frontend, "Meta tags and structured data"),
    agent("agent_052", "Form Validation Engineer", Phase::Frontend, "Client-side validation and UX"),
    agent("agent_053", "State Management Architect", Phase::Frontend, "Application state and data flow"),
    agent("agent_054", "API Integration Specialist", Phase::Frontend, "Backend communication and error handling"),
    agent("agent_055", "Routing Implementation Engineer", Phase::Frontend, "Navigation and URL management"),
    agent("agent_056", "Image Optimization Specialist", Phase::Frontend, "Asset loading and compression"),
    agent("agent_057", "Progressive Enhancement Engineer", Phase::Frontend, "Graceful degradation and fallbacks"),
    agent("agent_058", "Cross-Browser Compatibility Specialist", Phase::Frontend, "Browser testing and polyfills"),
    agent("agent_059", "Security Implementation Engineer", Phase::Frontend, "XSS prevention and secure patterns"),
    agent("agent_060", "Error Boundary Engineer", Phase::Frontend, "Error handling and recovery"),
    agent("agent_061", "Testing Implementation Specialist", Phase::Frontend, "Unit and integration testing"),
    agent("agent_062", "PWA Implementation Engineer", Phase::Frontend, "Service workers and offline capability"),
    agent("agent_063", "Analytics Integration Specialist", Phase::Frontend, "Tracking code and event management"),
    agent("agent_064", "Third-Party Integration Engineer", Phase::Frontend, "External service integration"),
    agent("agent_065", "Build System Optimizer", Phase::Frontend, "Webpack and build configuration"),
    agent("agent_066", "Code Splitting Specialist", Phase::Frontend, "Dynamic imports and lazy loading"),

    // Backend
    agent("agent_067", "API Architecture Designer", Phase::Backend, "RESTful design and endpoint structure"),
    agent("agent_068", "Database Schema Engineer", Phase::Backend, "Data modeling and relationships"),
    agent("agent_069", "Authentication Implementation Specialist", Phase::Backend, "User management and security"),
    agent("agent_070", "Security Implementation Engineer", Phase::Backend, "Data protection and validation"),
    agent("agent_071", "Performance Optimization Specialist", Phase::Backend, "Query optimization and caching"),
    agent("agent_072", "Error Handling Engineer", Phase::Backend, "Exception management and logging"),
    agent("agent_073", "API Documentation Specialist", Phase::Backend, "OpenAPI and developer experience"),
    agent("agent_074", "Data Validation Engineer", Phase::Backend, "Input sanitization and validation"),
    agent("agent_075", "File Upload Specialist", Phase::Backend, "Media handling and storage"),
    agent("agent_076", "Email Integration Engineer", Phase::Backend, "Notification and communication systems"),
    agent("agent_077", "Background Task Processor", Phase::Backend, "Async job processing and queues"),

    // Testing
    agent("agent_078", "Security Penetration Tester", Phase::Testing, "Vulnerability assessment and protection"),
    agent("agent_079", "Performance Testing Specialist", Phase::Testing, "Load testing and optimization"),
    agent("agent_080", "Cross-Browser Testing Engineer", Phase::Testing, "Compatibility validation and fixes"),
    agent("agent_081", "Accessibility Testing Specialist", Phase::Testing, "WCAG compliance verification"),
    agent("agent_082", "SEO Audit Specialist", Phase::Testing, "Search optimization validation"),
    agent("agent_083", "Mobile Testing Engineer", Phase::Testing, "Device compatibility and responsive testing"),

    // Deployment
    agent("agent_084", "GitHub Repository Manager", Phase::Deployment, "Version control and repository setup"),
    agent("agent_085", "CI/CD Pipeline Engineer", Phase::Deployment, "Automated deployment and testing"),
    agent("agent_086", "Domain Configuration Specialist", Phase::Deployment, "DNS and SSL setup"),
    agent("agent_087", "Performance Monitoring Setup Engineer", Phase::Deployment, "Analytics and monitoring configuration"),
    agent("agent_088", "Production Optimization Specialist", Phase::Deployment, "Live site optimization and maintenance"),
];

/// Read-only catalog of the 88 pipeline agents
///
/// The roster is compiled into the binary; the catalog is a zero-sized
/// handle over it so it can be passed around as explicit context.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentCatalog;

impl AgentCatalog {
    pub fn new() -> Self {
        Self
    }

    /// All agents, grouped by phase in pipeline order
    pub fn list_all(&self) -> &'static [AgentDescriptor] {
        &ROSTER
    }

    /// The contiguous slice of agents assigned to `phase`
    pub fn by_phase(&self, phase: Phase) -> &'static [AgentDescriptor] {
        let start = Phase::ALL[..phase.index()]
            .iter()
            .map(|p| self.count(*p))
            .sum::<usize>();
        &ROSTER[start..start + self.count(phase)]
    }

    /// Fixed number of agents in `phase`
    pub fn count(&self, phase: Phase) -> usize {
        match phase {
            Phase::Analysis => 22,
            Phase::Design => 22,
            Phase::Frontend => 22,
            Phase::Backend => 11,
            Phase::Testing => 6,
            Phase::Deployment => 5,
        }
    }

    /// Looks up an agent by id
    pub fn get(&self, id: &str) -> Option<&'static AgentDescriptor> {
        ROSTER.iter().find(|agent| agent.id == id)
    }
}
