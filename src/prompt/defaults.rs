use super::{ContractTypeChecklist, ModelParameters, PromptConfig, UserPromptTemplate};

const RULES_ANCHOR: &str = "STRICT RULES:";

const SYSTEM_PROMPT: &str = r#"You are a legal expert specialized in Moroccan law with more than 15 years of experience.
You master:
- The Moroccan Code of Obligations and Contracts (DOC)
- Moroccan commercial law
- Moroccan labour law
- Sector-specific regulations
- Recent Moroccan case law

MISSION: Analyze this contract against Moroccan legal standards and deliver a detailed, precise, and actionable assessment.

PRIORITY CRITERIA:
1. Compliance with Moroccan legislation in force
2. Legal and financial risks
3. Mandatory clauses for the contract type
4. Balance between the parties
5. Abusive or non-compliant clauses
6. Enforceability of the clauses

MANDATORY RESPONSE STRUCTURE (JSON only):
{
  "contractType": "precise type of the contract",
  "overallScore": score_between_1_and_10,
  "risks": [
    {
      "level": "high|medium|low",
      "title": "short risk title",
      "description": "detailed description with legal references",
      "recommendation": "concrete recommended action",
      "legalReference": "applicable article or statute"
    }
  ],
  "suggestions": [
    {
      "priority": "high|medium|low",
      "title": "improvement title",
      "description": "detailed explanation",
      "impact": "expected benefit",
      "implementation": "how to implement it"
    }
  ],
  "compliance": [
    {
      "status": "compliant|non_compliant|to_verify",
      "article": "precise legal reference (e.g. Art. 230 DOC)",
      "description": "compliance explanation",
      "action": "required action when not compliant"
    }
  ],
  "summary": "professional executive summary in 2-3 sentences",
  "keyPoints": ["essential points (max 5)"],
  "urgentActions": ["urgent actions if needed"]
}

STRICT RULES:
- Answer ONLY with valid JSON
- Use Moroccan law exclusively as the reference
- Cite precise articles whenever applicable
- Keep recommendations concrete and actionable
- Adapt the analysis to the identified contract type
- Always flag dangerous or illegal clauses"#;

const USER_PROMPT_BODY: &str = r#"{{header}}

{{context}}

CONTRACT TEXT:
{{text}}

SPECIFIC INSTRUCTIONS:
{{instructions}}

ANALYSIS PRIORITIES:
1. Clauses contrary to Moroccan public order
2. Significant contractual imbalances
3. Breaches of legal obligations
4. Risks of nullity or unenforceability
5. Legal optimization opportunities

Analyze now under Moroccan law exclusively."#;

const FIRST_SEGMENT_INSTRUCTIONS: &str = "- Identify the exact contract type
- Give an overall legal quality score
- Focus on major risks under Moroccan law
- Check that mandatory statements are present";

const CONTINUATION_INSTRUCTIONS: &str = "- Continue the analysis of the same contract
- Complete the risks and suggestions already identified
- Stay consistent with the previous analysis";

pub(super) fn default_prompt() -> PromptConfig {
    PromptConfig {
        version: "1.0.0".to_string(),
        last_modified: "2025-01-27".to_string(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt_template: UserPromptTemplate {
            body: USER_PROMPT_BODY.to_string(),
            first_segment_header: "NEW CONTRACT TO ANALYZE".to_string(),
            continuation_header: "CONTINUATION OF THE CONTRACT UNDER ANALYSIS".to_string(),
            context_label: "PREVIOUS CONTEXT: ".to_string(),
            first_segment_instructions: FIRST_SEGMENT_INSTRUCTIONS.to_string(),
            continuation_instructions: CONTINUATION_INSTRUCTIONS.to_string(),
        },
        model: ModelParameters::default(),
        rules_anchor: RULES_ANCHOR.to_string(),
        contract_types: vec![
            checklist(
                "contrat_travail",
                &["travail", "employment", "labour", "labor"],
                &[
                    "Fixed or open-ended term compliant with the Labour Code",
                    "Probation period within legal limits",
                    "Legal minimum wage respected",
                    "Compliant non-compete clauses",
                ],
            ),
            checklist(
                "contrat_commercial",
                &["commercial", "commerce", "distribution", "supply"],
                &[
                    "Compliance with the Commercial Code",
                    "Balanced termination clauses",
                    "Defined guarantees and liabilities",
                    "Competent jurisdiction specified",
                ],
            ),
            checklist(
                "contrat_bail",
                &["bail", "lease", "rental", "tenancy"],
                &[
                    "Term compliant with the lease law",
                    "Legal security deposit",
                    "Rent revision conditions",
                    "Landlord and tenant obligations",
                ],
            ),
        ],
    }
}

fn checklist(key: &str, keywords: &[&str], checks: &[&str]) -> ContractTypeChecklist {
    ContractTypeChecklist {
        key: key.to_string(),
        keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
        checks: checks.iter().map(|check| check.to_string()).collect(),
    }
}
