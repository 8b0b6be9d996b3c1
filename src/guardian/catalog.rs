//! The built-in guards.
use crate::core::types::EventSource;

use super::guard::{GuardConfig, MatchingMode, Narrative, TargetFrameKind};
use super::matcher::FrameMatcher;
use super::preconditions::GuardPreconditions;
use super::result::Category;

pub fn all() -> Vec<GuardConfig> {
    vec![
        reflection(),
        json_processing(),
        crypto(),
        string_concatenation(),
        thread_synchronization(),
        exceptions(),
        serialization(),
        jit_compilation(),
    ]
}

pub fn reflection() -> GuardConfig {
    GuardConfig::new(
        "Reflection Overhead",
        Category::Application,
        FrameMatcher::any_prefix(&[
            "jdk.internal.reflect.",
            "java.lang.reflect.Method#invoke",
            "java.lang.reflect.Constructor#newInstance",
        ]),
        0.05,
        Narrative {
            subject: "reflective calls",
            explanation: "Reflective method calls and object instantiation bypass the usual \
                          call sites and are harder for the JIT to optimize. Frameworks that \
                          resolve handlers, mappers or proxies reflectively on every call can \
                          spend a noticeable part of the CPU time here.",
            solution: "Cache reflective lookups, prefer MethodHandles or generated code over \
                       Method#invoke on hot paths, and check framework settings that enable \
                       bytecode generation instead of reflection.",
        },
    )
    .target(TargetFrameKind::Java)
}

pub fn json_processing() -> GuardConfig {
    GuardConfig::new(
        "JSON Processing",
        Category::Libraries,
        FrameMatcher::any_prefix(&[
            "com.fasterxml.jackson.",
            "com.google.gson.",
            "jakarta.json.",
            "org.json.",
        ]),
        0.05,
        Narrative {
            subject: "JSON processing",
            explanation: "Serializing and parsing JSON is often a large part of the work of a \
                          service that mostly moves data. A high share usually points at big \
                          payloads, repeated conversions of the same data, or mapper instances \
                          created per request.",
            solution: "Reuse mapper and reader instances, avoid converting the same payload \
                       several times, stream large documents instead of building trees, and \
                       consider a binary format for internal traffic.",
        },
    )
    .target(TargetFrameKind::Java)
}

pub fn crypto() -> GuardConfig {
    GuardConfig::new(
        "Cryptography and TLS",
        Category::Libraries,
        FrameMatcher::any_prefix(&[
            "javax.crypto.",
            "sun.security.ssl.",
            "com.sun.crypto.provider.",
            "sun.security.provider.",
        ]),
        0.05,
        Narrative {
            subject: "cryptography and TLS",
            explanation: "Encryption, hashing and TLS handshakes are CPU intensive. Frequent \
                          handshakes caused by short-lived connections, or a slow provider, can \
                          make them dominate the profile.",
            solution: "Reuse connections and TLS sessions, check that hardware accelerated \
                       intrinsics are used for the chosen ciphers, and avoid hashing or \
                       encrypting the same data repeatedly.",
        },
    )
    .target(TargetFrameKind::Java)
}

pub fn string_concatenation() -> GuardConfig {
    GuardConfig::new(
        "String Concatenation",
        Category::Application,
        FrameMatcher::any_prefix(&[
            "java.lang.StringConcatHelper#",
            "java.lang.StringBuilder#append",
            "java.lang.invoke.StringConcatFactory#",
        ]),
        0.05,
        Narrative {
            subject: "string concatenation",
            explanation: "Building strings allocates and copies character data. Concatenation \
                          in loops or eager building of log messages that are never written \
                          shows up as a high share of these frames.",
            solution: "Build strings only when they are needed, use parameterized logging, \
                       presize builders, and move concatenation out of tight loops.",
        },
    )
    .target(TargetFrameKind::Java)
}

pub fn thread_synchronization() -> GuardConfig {
    GuardConfig::new(
        "Thread Synchronization",
        Category::Concurrency,
        FrameMatcher::any_prefix(&[
            "java.util.concurrent.locks.",
            "jdk.internal.misc.Unsafe#park",
            "java.lang.Object#wait",
        ]),
        0.05,
        Narrative {
            subject: "thread synchronization",
            explanation: "Samples in locks, parking and monitor waits mean that threads spend \
                          their time coordinating instead of working. With wall-clock sampling \
                          this includes idle pool threads, with CPU sampling it points at \
                          contention or spinning.",
            solution: "Reduce the scope of locked sections, prefer lock-free or concurrent \
                       data structures, and check whether pools are sized for the workload.",
        },
    )
}

pub fn exceptions() -> GuardConfig {
    GuardConfig::new(
        "Exception Creation",
        Category::Application,
        FrameMatcher::Any(vec![
            FrameMatcher::prefix("java.lang.Throwable#fillInStackTrace"),
            FrameMatcher::suffix("Exception#<init>"),
        ]),
        0.05,
        Narrative {
            subject: "creating exceptions",
            explanation: "Creating an exception captures the stack trace of the current \
                          thread, which is expensive. Exceptions used for regular control flow \
                          can make this a visible share of the profile.",
            solution: "Avoid exceptions for expected outcomes, reuse preallocated exceptions \
                       or disable stack trace capture for them, and check for code that \
                       retries in a loop while failing.",
        },
    )
}

pub fn serialization() -> GuardConfig {
    GuardConfig::new(
        "Java Serialization",
        Category::Libraries,
        FrameMatcher::any_prefix(&[
            "java.io.ObjectOutputStream#writeObject",
            "java.io.ObjectInputStream#readObject",
        ]),
        0.05,
        Narrative {
            subject: "Java serialization",
            explanation: "Built-in Java serialization relies on reflection and writes verbose \
                          class metadata. It is slow compared to dedicated formats and often \
                          hides in session replication, caches or remote calls.",
            solution: "Replace Java serialization with a dedicated format, or implement \
                       Externalizable for the hot types, and make sure objects are not \
                       serialized more often than needed.",
        },
    )
    .target(TargetFrameKind::Java)
}

pub fn jit_compilation() -> GuardConfig {
    GuardConfig::new(
        "JIT Compilation",
        Category::JitCompilation,
        FrameMatcher::exact("CompileBroker::compiler_thread_loop"),
        0.2,
        Narrative {
            subject: "the JIT compilation",
            explanation: "The JIT compilation ratio shows how much of the time the JVM spends \
                          compiling code. It is usually high during warm-up, after a change of \
                          the application's behavior that needs new code compiled, or when \
                          frequent deoptimizations lead to recompilation.",
            solution: "Capture a longer recording that covers the steady state, reduce \
                       recompilation caused by loading new classes, and check the number of \
                       deoptimizations.",
        },
    )
    .target(TargetFrameKind::Native)
    .matching(MatchingMode::SingleMatch)
    // compiler threads are only visible with native frames
    .preconditions(GuardPreconditions::default().event_source(EventSource::AsyncProfiler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FrameKind, StackFrame, StackRecord};
    use crate::guardian::preconditions::Preconditions;
    use crate::guardian::result::Severity;
    use crate::guardian::traversal::evaluate;
    use crate::test_utils::stacks::{frame, record, tree};

    #[test]
    fn catalog_is_complete_and_unique() {
        let guards = all();
        assert_eq!(guards.len(), 8);
        let mut names: Vec<&str> = guards.iter().map(|g| g.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 8);
        assert!(guards.iter().all(|g| g.threshold > 0.0 && g.threshold < 1.0));
    }

    #[test]
    fn serialization_guard_warns_on_the_scenario() {
        let root = tree(&[
            record(
                &["Main#run", "Handler#handle", "java.io.ObjectOutputStream#writeObject"],
                10,
            ),
            record(&["Main#run"], 90),
        ]);
        let result = evaluate(&serialization(), &root, &Preconditions::new(EventSource::Jdk), 0);
        assert_eq!(result.severity, Severity::Warning);
        assert_eq!(result.matched_percent, "10%");
        assert!(result.summary.contains("Java serialization"));
    }

    #[test]
    fn exceptions_match_any_exception_constructor() {
        let root = tree(&[
            record(&["Main#run", "com.acme.NotFoundException#<init>"], 2),
            record(&["Main#run", "java.lang.Throwable#fillInStackTrace"], 1),
            record(&["Main#run"], 97),
        ]);
        let result = evaluate(&exceptions(), &root, &Preconditions::new(EventSource::Jdk), 0);
        assert_eq!(result.observed_value, 3);
        assert_eq!(result.severity, Severity::Ok);
    }

    #[test]
    fn jit_guard_needs_async_profiler_and_native_frames() {
        let mut compiler = vec![frame("java.lang.Thread#run")];
        compiler.push(StackFrame::new(
            "",
            "CompileBroker::compiler_thread_loop",
            FrameKind::Cpp,
        ));
        let root = tree(&[
            StackRecord::new(compiler, 30, 0),
            record(&["Main#run"], 70),
        ]);

        let jdk = Preconditions::new(EventSource::Jdk);
        assert_eq!(
            evaluate(&jit_compilation(), &root, &jdk, 0).severity,
            Severity::NotApplicable
        );

        let async_profiler = Preconditions::new(EventSource::AsyncProfiler);
        let result = evaluate(&jit_compilation(), &root, &async_profiler, 0);
        assert_eq!(result.severity, Severity::Warning);
        assert_eq!(result.observed_value, 30);
        assert_eq!(result.matched_percent, "30%");
    }

    #[test]
    fn java_guards_ignore_native_frames_of_the_same_name() {
        let root = tree(&[
            StackRecord::new(vec![StackFrame::native("org.json.fake")], 50, 0),
            record(&["Main#run"], 50),
        ]);
        let result = evaluate(&json_processing(), &root, &Preconditions::new(EventSource::Jdk), 0);
        assert_eq!(result.observed_value, 0);
    }
}
